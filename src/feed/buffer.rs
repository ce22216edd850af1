use std::collections::HashSet;

use crate::feed::record::JobRecord;
use crate::feed::store::ReconciliationStore;

/// Pushed records waiting for the user to pull them into the visible list.
///
/// Keyed by `url` rather than `id`: pushes can race the bulk load, and the url
/// is the only identity stable before a record is reconciled into the store.
#[derive(Debug, Default)]
pub struct IncomingBuffer {
    pending: Vec<JobRecord>,
    urls: HashSet<String>,
}

impl IncomingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records whose url is neither buffered nor already in `store`.
    /// Returns the number accepted.
    pub fn offer(&mut self, records: Vec<JobRecord>, store: &ReconciliationStore) -> usize {
        let offered = records.len();
        let mut accepted = 0;
        for record in records {
            if store.contains_url(&record.url) || self.urls.contains(&record.url) {
                continue;
            }
            self.urls.insert(record.url.clone());
            self.pending.push(record);
            accepted += 1;
        }
        tracing::debug!(
            offered,
            accepted,
            buffered = self.pending.len(),
            "Buffered pushed jobs"
        );
        accepted
    }

    /// Drop buffered records whose url has since appeared in `store`.
    pub fn prune(&mut self, store: &ReconciliationStore) -> usize {
        let before = self.pending.len();
        self.pending.retain(|r| !store.contains_url(&r.url));
        let removed = before - self.pending.len();
        if removed > 0 {
            self.urls = self.pending.iter().map(|r| r.url.clone()).collect();
        }
        removed
    }

    /// Take everything buffered, leaving the buffer empty.
    pub fn flush(&mut self) -> Vec<JobRecord> {
        self.urls.clear();
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[JobRecord] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
