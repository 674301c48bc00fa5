//! Browser automation layer for the capture pipeline
//!
//! The capture core only talks to a page through [`PageDriver`]. The
//! production implementation is [`ChromePage`], a headless Chrome tab
//! launched by [`BrowserManager`].
//!
//! # Example
//!
//! ```no_run
//! use comic_capture::browser::{BrowserConfig, BrowserManager, PageDriver, Readiness};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BrowserManager::new(BrowserConfig::default())?;
//! let page = manager.new_page()?;
//!
//! page.navigate("https://example.com/comic/1", Readiness::DomContentLoaded)?;
//! let elements = page.image_elements("#divImage img")?;
//! println!("Found {} page images", elements.len());
//! page.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod page;

use crate::models::{PageElement, SettledImage};
use std::sync::Arc;

// Re-export main types for convenience
pub use config::BrowserConfig;
pub use manager::{BrowserError, BrowserManager};
pub use page::ChromePage;

/// How far a navigation must progress before `navigate` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The document is parsed (`readyState` is `interactive` or later)
    DomContentLoaded,
    /// The main frame finished loading
    Load,
}

/// Resource classification reported by the browser for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Other,
}

/// One network response observed by the page.
pub trait NetworkResponse {
    fn url(&self) -> &str;

    fn resource_kind(&self) -> ResourceKind;

    /// Raw `content-type` header value, if the response carried one
    fn content_type(&self) -> Option<&str>;

    /// Response payload.
    ///
    /// `None` when the response has no readable body at all (redirects,
    /// empty responses, aborted loads).
    fn body(&self) -> Option<Result<Vec<u8>, BrowserError>>;
}

/// Answers DOM questions while responses are still arriving.
pub trait ElementProbe: Send + Sync {
    /// Whether an element matched by `selector` currently has source `src`
    fn has_image(&self, selector: &str, src: &str) -> Result<bool, BrowserError>;
}

/// Callback invoked for every network response, possibly from several
/// threads at once.
pub type ResponseCallback = Arc<dyn Fn(&dyn NetworkResponse) + Send + Sync>;

/// The browser capabilities the capture session depends on.
pub trait PageDriver: Send + Sync {
    fn navigate(&self, url: &str, readiness: Readiness) -> Result<(), BrowserError>;

    /// Block until every element matched by `selector` has loaded or errored.
    fn settle_images(&self, selector: &str) -> Result<Vec<SettledImage>, BrowserError>;

    /// Read source and rendered size of every matched element, in document order.
    fn image_elements(&self, selector: &str) -> Result<Vec<PageElement>, BrowserError>;

    fn element_probe(&self) -> Arc<dyn ElementProbe>;

    fn on_response(&self, callback: ResponseCallback) -> Result<(), BrowserError>;

    fn close(&self) -> Result<(), BrowserError>;
}
