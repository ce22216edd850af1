//! Apply workflow: open a posting, then ask the user what happened.
//!
//! The coordinator is a small state machine (`Idle` / awaiting confirmation)
//! plus a ledger of status writes sent to the backend. Every acknowledged
//! write newer than the last one committed for its record is applied locally.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::feed::record::{JobId, JobRecord, JobStatus};
use crate::feed::store::ReconciliationStore;

/// What the user reports after visiting the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplyOutcome {
    Applied,
    Draft,
    Cancel,
}

impl ApplyOutcome {
    fn target_status(&self) -> Option<JobStatus> {
        match self {
            ApplyOutcome::Applied => Some(JobStatus::Applied),
            ApplyOutcome::Draft => Some(JobStatus::Draft),
            ApplyOutcome::Cancel => None,
        }
    }
}

impl std::str::FromStr for ApplyOutcome {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPLIED" => Ok(ApplyOutcome::Applied),
            "DRAFT" => Ok(ApplyOutcome::Draft),
            "CANCEL" => Ok(ApplyOutcome::Cancel),
            _ => Err(FeedError::InvalidValue {
                field: "outcome",
                value: s.to_string(),
            }),
        }
    }
}

/// The record the user is being asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingApply {
    pub id: JobId,
    pub url: String,
    pub title: String,
    pub company: String,
}

impl PendingApply {
    fn from_record(record: &JobRecord) -> Self {
        Self {
            id: record.id,
            url: record.url.clone(),
            title: record.title.clone(),
            company: record.company.clone(),
        }
    }
}

/// Result of starting an apply interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyStarted {
    pub pending: PendingApply,
    /// A confirmation that was awaiting an answer and has been cancelled.
    pub superseded: Option<JobId>,
}

/// A status write to send to the backend. `id` and `status` are fixed when
/// the user confirms, so late responses apply to the right record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusWrite {
    pub id: JobId,
    pub status: JobStatus,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WriteState {
    InFlight,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedWrite {
    pub write: StatusWrite,
    pub state: WriteState,
}

/// How a backend response was folded into local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCompletion {
    /// Acknowledged and applied to the store.
    Committed,
    /// A newer write for the same record has already been committed, or
    /// this failed write was superseded by a newer one.
    Stale,
    /// Rejected; kept for retry, store untouched.
    Failed,
}

#[derive(Debug, Default)]
pub struct ApplyCoordinator {
    awaiting: Option<PendingApply>,
    /// Latest write per record that is still in flight or failed.
    writes: HashMap<JobId, TrackedWrite>,
    /// Highest acknowledged seq per record.
    committed: HashMap<JobId, u64>,
    next_seq: u64,
}

impl ApplyCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an interaction for `record`. Replaces (cancels) any pending one.
    ///
    /// The caller opens `pending.url`; that side effect is fire-and-forget.
    pub fn begin(&mut self, record: &JobRecord) -> Result<ApplyStarted> {
        if record.status == JobStatus::Applied {
            return Err(FeedError::AlreadyApplied(record.id));
        }

        let pending = PendingApply::from_record(record);
        let superseded = self.awaiting.replace(pending.clone()).map(|p| p.id);
        if let Some(previous) = superseded {
            tracing::info!(
                job_id = record.id,
                superseded = previous,
                "Pending apply confirmation replaced"
            );
        }
        Ok(ApplyStarted {
            pending,
            superseded,
        })
    }

    pub fn awaiting(&self) -> Option<&PendingApply> {
        self.awaiting.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.awaiting.is_none()
    }

    /// Answer the pending confirmation. Always returns to idle.
    ///
    /// Returns the write to dispatch, or `None` for `Cancel`.
    pub fn resolve(&mut self, outcome: ApplyOutcome) -> Result<Option<StatusWrite>> {
        let pending = self
            .awaiting
            .take()
            .ok_or(FeedError::NoPendingConfirmation)?;

        let Some(status) = outcome.target_status() else {
            tracing::debug!(job_id = pending.id, "Apply confirmation cancelled");
            return Ok(None);
        };
        Ok(Some(self.issue(pending.id, status)))
    }

    fn issue(&mut self, id: JobId, status: JobStatus) -> StatusWrite {
        self.next_seq += 1;
        let write = StatusWrite {
            id,
            status,
            seq: self.next_seq,
        };
        self.writes.insert(
            id,
            TrackedWrite {
                write,
                state: WriteState::InFlight,
            },
        );
        write
    }

    /// Fold a backend response into local state.
    ///
    /// A success commits unless a newer write for the record has already
    /// committed. A failure is only tracked while it is the latest write.
    pub fn complete(
        &mut self,
        write: StatusWrite,
        result: std::result::Result<(), String>,
        store: &mut ReconciliationStore,
    ) -> WriteCompletion {
        let is_latest = self
            .writes
            .get(&write.id)
            .is_some_and(|t| t.write.seq == write.seq);

        match result {
            Ok(()) => {
                let last = self.committed.get(&write.id).copied().unwrap_or(0);
                if write.seq <= last {
                    tracing::info!(
                        job_id = write.id,
                        seq = write.seq,
                        committed_seq = last,
                        "Ignoring ack older than committed status write"
                    );
                    return WriteCompletion::Stale;
                }

                self.committed.insert(write.id, write.seq);
                if self
                    .writes
                    .get(&write.id)
                    .is_some_and(|t| t.write.seq <= write.seq)
                {
                    self.writes.remove(&write.id);
                }
                store.set_status(write.id, write.status);
                tracing::info!(job_id = write.id, status = %write.status, seq = write.seq, "Status write committed");
                WriteCompletion::Committed
            }
            Err(error) if is_latest => {
                tracing::error!(
                    job_id = write.id,
                    status = %write.status,
                    error = %error,
                    "Status write failed, local state left unchanged"
                );
                self.writes.insert(
                    write.id,
                    TrackedWrite {
                        write,
                        state: WriteState::Failed { error },
                    },
                );
                WriteCompletion::Failed
            }
            Err(error) => {
                tracing::warn!(
                    job_id = write.id,
                    seq = write.seq,
                    error = %error,
                    "Superseded status write failed"
                );
                WriteCompletion::Stale
            }
        }
    }

    /// Re-issue a failed write under a fresh sequence number.
    pub fn retry(&mut self, id: JobId) -> Result<StatusWrite> {
        let status = match self.writes.get(&id) {
            Some(TrackedWrite {
                write,
                state: WriteState::Failed { .. },
            }) => write.status,
            _ => return Err(FeedError::NoFailedWrite(id)),
        };
        Ok(self.issue(id, status))
    }

    /// Forget a failed write without retrying it.
    pub fn dismiss(&mut self, id: JobId) -> Result<()> {
        match self.writes.get(&id) {
            Some(TrackedWrite {
                state: WriteState::Failed { .. },
                ..
            }) => {
                self.writes.remove(&id);
                Ok(())
            }
            _ => Err(FeedError::NoFailedWrite(id)),
        }
    }

    pub fn failed_writes(&self) -> Vec<TrackedWrite> {
        let mut failed: Vec<TrackedWrite> = self
            .writes
            .values()
            .filter(|t| matches!(t.state, WriteState::Failed { .. }))
            .cloned()
            .collect();
        failed.sort_by_key(|t| t.write.seq);
        failed
    }

    pub fn in_flight(&self) -> usize {
        self.writes
            .values()
            .filter(|t| t.state == WriteState::InFlight)
            .count()
    }
}
