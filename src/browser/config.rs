use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Chrome instance driving the reader page
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size
    pub window_width: u32,
    pub window_height: u32,

    /// Persistent profile directory, keeps cookies and logins between runs
    pub user_data_dir: Option<PathBuf>,

    /// Timeout for a single navigation or DOM call in seconds
    pub timeout_secs: u64,

    /// Chrome is shut down after this long without any DevTools traffic
    pub idle_timeout_secs: u64,

    /// Custom user agent
    pub user_agent: Option<String>,

    /// Additional Chrome flags
    pub chrome_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            // Reader sites tend to gate content behind a visible session
            headless: false,
            window_width: 1280,
            window_height: 1024,
            user_data_dir: Some(PathBuf::from("./user_data")),
            timeout_secs: 60,
            idle_timeout_secs: 600,
            user_agent: None,
            chrome_flags: vec![],
        }
    }
}

impl BrowserConfig {
    /// Headless configuration with the usual container-friendly flags
    pub fn headless_mode() -> Self {
        Self {
            headless: true,
            chrome_flags: vec![
                "--disable-dev-shm-usage".to_string(),
                "--no-sandbox".to_string(),
            ],
            ..Self::default()
        }
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
