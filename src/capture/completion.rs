use super::store::ImageStore;
use super::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one completion check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPoll {
    Pending { captured: usize, expected: usize },
    /// Returned by exactly one check, the first that saw enough images
    Complete { captured: usize },
    AlreadyComplete,
}

/// Decides when the store holds an image for every expected page.
///
/// Page load and network capture race each other, so the detector waits on
/// the store's upsert signal, re-checking at least every `interval`, until
/// the count is reached or `timeout` expires.
pub struct CompletionDetector {
    store: Arc<ImageStore>,
    expected: usize,
    interval: Duration,
    timeout: Option<Duration>,
    fired: AtomicBool,
}

impl CompletionDetector {
    pub fn new(
        store: Arc<ImageStore>,
        expected: usize,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            expected,
            interval,
            timeout,
            fired: AtomicBool::new(false),
        }
    }

    pub fn check(&self) -> CompletionPoll {
        let captured = self.store.len();
        if captured < self.expected {
            return CompletionPoll::Pending {
                captured,
                expected: self.expected,
            };
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            CompletionPoll::AlreadyComplete
        } else {
            CompletionPoll::Complete { captured }
        }
    }

    /// Block until every expected page image is captured.
    ///
    /// Returns the number of captured images at the moment of completion.
    pub fn wait(&self) -> Result<usize, CaptureError> {
        let start = Instant::now();
        let mut last_reported = None;

        loop {
            let captured = match self.check() {
                CompletionPoll::Complete { captured } => {
                    log::info!("All {} page images captured", self.expected);
                    return Ok(captured);
                }
                CompletionPoll::AlreadyComplete => return Ok(self.store.len()),
                CompletionPoll::Pending { captured, .. } => captured,
            };

            if last_reported != Some(captured) {
                log::info!("Captured {}/{} page images", captured, self.expected);
                last_reported = Some(captured);
            }

            let tick = match self.timeout {
                Some(limit) => {
                    let waited = start.elapsed();
                    if waited >= limit {
                        return Err(CaptureError::LivenessStall {
                            captured,
                            expected: self.expected,
                            waited,
                        });
                    }
                    self.interval.min(limit - waited)
                }
                None => self.interval,
            };

            self.store.wait_for_growth(captured, tick);
        }
    }
}
