use super::store::ImageStore;
use super::CaptureError;
use crate::browser::{ElementProbe, NetworkResponse, ResourceKind, ResponseCallback};
use crate::models::ImageRecord;
use std::sync::Arc;

/// Turns page image responses into store records.
///
/// Only responses for images that are currently rendered by an element
/// matching the selector are kept. Every failure is absorbed here; a page
/// whose image never made it into the store surfaces later as a
/// [`CaptureError::CaptureMismatch`].
pub struct ResponseInterceptor {
    store: Arc<ImageStore>,
    probe: Arc<dyn ElementProbe>,
    selector: String,
}

impl ResponseInterceptor {
    pub fn new(store: Arc<ImageStore>, probe: Arc<dyn ElementProbe>, selector: impl Into<String>) -> Self {
        Self {
            store,
            probe,
            selector: selector.into(),
        }
    }

    /// Inspect one response; upserts a record when it is a page image.
    pub fn handle(&self, response: &dyn NetworkResponse) {
        if response.resource_kind() != ResourceKind::Image {
            return;
        }

        let url = response.url();
        match self.probe.has_image(&self.selector, url) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                log::debug!("Skipping {}: element lookup failed: {}", url, e);
                return;
            }
        }

        match Self::decode(response) {
            Ok(Some(record)) => {
                log::debug!(
                    "Captured {} ({}, {} bytes)",
                    record.source_url,
                    record.mime_subtype,
                    record.bytes.len()
                );
                if self.store.upsert(record).is_some() {
                    log::debug!("Replaced earlier capture of {}", url);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Dropping page image: {}", e),
        }
    }

    fn decode(response: &dyn NetworkResponse) -> Result<Option<ImageRecord>, CaptureError> {
        let url = response.url();
        let content_type = response.content_type().unwrap_or("");

        // Validate metadata before paying for the body
        if crate::models::split_media_type(content_type).is_none() {
            return Err(CaptureError::MalformedResponseMetadata {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }

        let bytes = match response.body() {
            None => return Ok(None),
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                log::warn!("Could not read body of {}: {}", url, e);
                return Ok(None);
            }
        };

        Ok(ImageRecord::from_content_type(url, content_type, bytes))
    }

    /// Wrap this interceptor as a browser response callback
    pub fn into_callback(self) -> ResponseCallback {
        Arc::new(move |response: &dyn NetworkResponse| self.handle(response))
    }
}
