use super::completion::CompletionDetector;
use super::interceptor::ResponseInterceptor;
use super::store::ImageStore;
use super::CaptureError;
use crate::browser::{PageDriver, Readiness};
use crate::config::{CaptureConfig, SettlePolicy};
use crate::document::{ArtifactWriter, DocumentAssembler};
use crate::models::{SettleState, SettledImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub path: PathBuf,
    pub pages: usize,
}

/// One run of the pipeline against one reader page.
///
/// The session owns the page for its whole lifetime and closes it when
/// [`CaptureSession::run`] returns, whatever the outcome.
pub struct CaptureSession<D: PageDriver> {
    driver: D,
    config: CaptureConfig,
    assembler: DocumentAssembler,
    writer: ArtifactWriter,
}

impl<D: PageDriver> CaptureSession<D> {
    pub fn new(driver: D, config: CaptureConfig) -> Self {
        Self {
            driver,
            config,
            assembler: DocumentAssembler::new(),
            writer: ArtifactWriter::new(),
        }
    }

    /// Capture every page image at `url` and write them as a PDF to `output`.
    pub fn run(self, url: &str, output: &Path) -> Result<CaptureReport, CaptureError> {
        let result = self.capture(url, output);

        if let Err(e) = self.driver.close() {
            log::warn!("Failed to close page: {}", e);
        }

        match &result {
            Ok(report) => log::info!(
                "Comics {} saved, pages: {}",
                report.path.display(),
                report.pages
            ),
            Err(e) => log::error!("Capture of {} failed: {}", url, e),
        }
        result
    }

    fn capture(&self, url: &str, output: &Path) -> Result<CaptureReport, CaptureError> {
        let selector = self.config.image_selector.as_str();
        let store = Arc::new(ImageStore::new());

        let interceptor =
            ResponseInterceptor::new(Arc::clone(&store), self.driver.element_probe(), selector);
        self.driver.on_response(interceptor.into_callback())?;

        self.driver.navigate(url, Readiness::DomContentLoaded)?;

        let settled = self.driver.settle_images(selector)?;
        self.check_settled(&settled)?;

        let expected = self.driver.image_elements(selector)?.len();
        if expected == 0 {
            return Err(CaptureError::NoPages {
                selector: selector.to_string(),
            });
        }
        log::info!("Waiting for {} page images", expected);

        let detector = CompletionDetector::new(
            Arc::clone(&store),
            expected,
            self.config.poll_interval(),
            self.config.capture_timeout(),
        );
        let waited = detector.wait();

        // Sizes are read again from the live layout, which may have reflowed.
        // After a stall this also names the first page that never arrived.
        let elements = self.driver.image_elements(selector)?;
        let document = match (waited, self.assembler.assemble(&elements, &store)) {
            (Ok(_), assembled) => assembled?,
            (Err(stall), Err(mismatch)) => {
                log::warn!("{}", stall);
                return Err(mismatch);
            }
            (Err(stall), Ok(_)) => return Err(stall),
        };
        let path = self.writer.write(&document, output)?;

        Ok(CaptureReport {
            path,
            pages: document.page_count(),
        })
    }

    fn check_settled(&self, settled: &[SettledImage]) -> Result<(), CaptureError> {
        for image in settled.iter().filter(|i| i.state == SettleState::Errored) {
            match self.config.settle_policy {
                SettlePolicy::TolerateErrors => {
                    log::warn!("Page image failed to load in the browser: {}", image.src)
                }
                SettlePolicy::RequireLoaded => {
                    return Err(CaptureError::ImageLoadFailed {
                        src: image.src.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}
