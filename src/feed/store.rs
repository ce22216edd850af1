use std::collections::HashSet;

use crate::feed::record::{JobId, JobRecord, JobStatus};

/// The authoritative collection of job records.
///
/// Records are never removed except by [`ReconciliationStore::replace_all`], and
/// `status` is the only field ever written after a record is inserted.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    records: Vec<JobRecord>,
    ids: HashSet<JobId>,
    urls: HashSet<String>,
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection (initial bulk load).
    ///
    /// Returns the number of records kept. Repeated ids keep their first occurrence.
    pub fn replace_all(&mut self, records: Vec<JobRecord>) -> usize {
        self.records.clear();
        self.ids.clear();
        self.urls.clear();

        let offered = records.len();
        for record in records {
            if self.ids.insert(record.id) {
                self.urls.insert(record.url.clone());
                self.records.push(record);
            }
        }
        if self.records.len() < offered {
            tracing::warn!(
                offered,
                kept = self.records.len(),
                "Bulk load contained repeated ids, later copies dropped"
            );
        }
        self.records.len()
    }

    /// Insert records whose id is not yet known, ahead of the existing ones.
    ///
    /// Insert-only: a record whose id already exists is dropped without
    /// touching the stored copy. Returns the number of records inserted.
    pub fn merge(&mut self, records: Vec<JobRecord>) -> usize {
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if self.ids.insert(record.id) {
                self.urls.insert(record.url.clone());
                fresh.push(record);
            } else {
                tracing::debug!(job_id = record.id, "Merge skipped known id");
            }
        }

        let inserted = fresh.len();
        if inserted > 0 {
            fresh.append(&mut self.records);
            self.records = fresh;
        }
        inserted
    }

    /// Set the status of a record in place. Unknown ids are ignored.
    pub fn set_status(&mut self, id: JobId, status: JobStatus) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => {
                tracing::debug!(job_id = id, status = %status, "Status update for unknown job ignored");
                false
            }
        }
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records in stored order (most recently merged first).
    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn contains_id(&self, id: JobId) -> bool {
        self.ids.contains(&id)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Distinct sources in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.source.as_str()))
            .map(|r| r.source.clone())
            .collect()
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
