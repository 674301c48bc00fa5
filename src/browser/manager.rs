use super::config::BrowserConfig;
use super::page::ChromePage;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::sync::Arc;

/// Owns the Chrome process and hands out pages
pub struct BrowserManager {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Launch Chrome with the given configuration
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        if let Some(dir) = &config.user_data_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                BrowserError::ConfigurationError(format!(
                    "Cannot create profile directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let launch_options = Self::build_launch_options(&config)?;

        log::info!(
            "Launching Chrome (headless={}, profile={:?})",
            config.headless,
            config.user_data_dir
        );
        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::InitializationError(e.to_string()))?;

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    /// Build Chrome launch options from our config
    fn build_launch_options(config: &BrowserConfig) -> Result<LaunchOptions<'_>, BrowserError> {
        let args: Vec<&OsStr> = config.chrome_flags.iter().map(OsStr::new).collect();

        let mut builder = LaunchOptions::default_builder();
        builder
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .user_data_dir(config.user_data_dir.clone())
            .idle_browser_timeout(config.idle_timeout())
            .args(args);

        if config.chrome_flags.iter().any(|f| f == "--no-sandbox") {
            builder.sandbox(false);
        }

        builder
            .build()
            .map_err(|e| BrowserError::ConfigurationError(e.to_string()))
    }

    /// Open a new tab wrapped as a capture page
    pub fn new_page(&self) -> Result<ChromePage, BrowserError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        tab.set_default_timeout(self.config.timeout());

        if let Some(user_agent) = &self.config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        }

        Ok(ChromePage::new(tab, self.config.timeout()))
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    #[error("Browser configuration error: {0}")]
    ConfigurationError(String),

    #[error("Tab creation failed: {0}")]
    TabCreationError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript execution error: {0}")]
    JavaScriptError(String),

    #[error("Response body unavailable: {0}")]
    ResponseBodyError(String),

    #[error("Page already closed")]
    PageClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_build() {
        let config = BrowserConfig::default();
        let options = BrowserManager::build_launch_options(&config);
        assert!(options.is_ok());
    }

    #[test]
    fn test_headless_mode_options() {
        let config = BrowserConfig::headless_mode();
        let options = BrowserManager::build_launch_options(&config).unwrap();

        assert!(options.headless);
        assert!(!options.sandbox);
        assert!(options
            .args
            .iter()
            .any(|arg| arg.to_string_lossy().contains("no-sandbox")));
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_browser_manager_creation() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrowserConfig {
            user_data_dir: Some(dir.path().join("profile")),
            ..BrowserConfig::headless_mode()
        };
        let manager = BrowserManager::new(config).unwrap();
        assert!(manager.new_page().is_ok());
    }
}
