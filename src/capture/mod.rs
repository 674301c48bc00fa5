//! Capture pipeline: response interception, the shared image store, and
//! completion detection, tied together by [`CaptureSession`].

pub mod completion;
pub mod interceptor;
pub mod session;
pub mod store;

use crate::browser::BrowserError;
use std::path::PathBuf;
use std::time::Duration;

pub use completion::{CompletionDetector, CompletionPoll};
pub use interceptor::ResponseInterceptor;
pub use session::{CaptureReport, CaptureSession};
pub use store::ImageStore;

/// Failures of a capture session
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No captured image for page element {url}")]
    CaptureMismatch { url: String },

    #[error("Malformed content-type {content_type:?} for {url}")]
    MalformedResponseMetadata { url: String, content_type: String },

    #[error("Incomplete capture: {captured} of {expected} page images after {waited:?}")]
    LivenessStall {
        captured: usize,
        expected: usize,
        waited: Duration,
    },

    #[error("Page image failed to load: {src}")]
    ImageLoadFailed { src: String },

    #[error("No page images matched {selector}")]
    NoPages { selector: String },

    #[error("Could not encode page image {url}: {reason}")]
    Encode { url: String, reason: String },

    #[error("PDF serialization failed: {0}")]
    Pdf(String),

    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}
