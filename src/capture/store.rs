use crate::models::ImageRecord;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// URL-keyed accumulator of captured page images.
///
/// Written from the browser's response thread, read by the session. Every
/// upsert signals waiters so completion can be detected without polling.
#[derive(Debug, Default)]
pub struct ImageStore {
    records: Mutex<HashMap<String, Arc<ImageRecord>>>,
    changed: Condvar,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ImageRecord>>> {
        // A panicked writer cannot leave a half-inserted record behind
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the record for its URL; returns the replaced one.
    pub fn upsert(&self, record: ImageRecord) -> Option<Arc<ImageRecord>> {
        let previous = {
            let mut records = self.lock();
            records.insert(record.source_url.clone(), Arc::new(record))
        };
        self.changed.notify_all();
        previous
    }

    pub fn get(&self, url: &str) -> Option<Arc<ImageRecord>> {
        self.lock().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until the store no longer holds `seen` entries or `timeout`
    /// passes, and return the current size.
    pub fn wait_for_growth(&self, seen: usize, timeout: Duration) -> usize {
        let records = self.lock();
        let (records, _) = self
            .changed
            .wait_timeout_while(records, timeout, |records| records.len() == seen)
            .unwrap_or_else(PoisonError::into_inner);
        records.len()
    }
}
