use crate::browser::BrowserConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory relative PDF names are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// What to do with a page image that fired `error` instead of `load`
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Count it as settled and carry on; its page fails later if no bytes arrived
    TolerateErrors,
    /// Abort the capture immediately
    RequireLoaded,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// CSS selector matching one element per comic page
    #[serde(default = "default_image_selector")]
    pub image_selector: String,

    /// Completion re-check interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up waiting for page images after this many seconds; 0 waits forever
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,

    #[serde(default = "default_settle_policy")]
    pub settle_policy: SettlePolicy,

    /// Attempts to read a response body before dropping the image
    #[serde(default = "default_body_retry_attempts")]
    pub body_retry_attempts: u32,

    #[serde(default = "default_body_retry_delay")]
    pub body_retry_delay_ms: u64,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_image_selector() -> String { "#divImage img".to_string() }
fn default_poll_interval() -> u64 { 500 }
fn default_capture_timeout() -> u64 { 300 }
fn default_settle_policy() -> SettlePolicy { SettlePolicy::TolerateErrors }
fn default_body_retry_attempts() -> u32 { 3 }
fn default_body_retry_delay() -> u64 { 200 }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_selector: default_image_selector(),
            poll_interval_ms: default_poll_interval(),
            capture_timeout_secs: default_capture_timeout(),
            settle_policy: default_settle_policy(),
            body_retry_attempts: default_body_retry_attempts(),
            body_retry_delay_ms: default_body_retry_delay(),
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `None` means the capture may wait indefinitely
    pub fn capture_timeout(&self) -> Option<Duration> {
        match self.capture_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn body_retry_delay(&self) -> Duration {
        Duration::from_millis(self.body_retry_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            browser: BrowserConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Config {
    /// Read configuration from `path`, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("{} not found, using default configuration", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("Ignoring invalid {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve an output file name against `output_dir`
    pub fn output_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        }
    }
}
