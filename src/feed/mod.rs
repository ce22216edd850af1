//! Live feed reconciliation and view derivation.
//!
//! - [`store::ReconciliationStore`]: the authoritative collection
//! - [`buffer::IncomingBuffer`]: pushed records held back until the user flushes
//! - [`view::project`]: filter, sort and paginate into a [`view::View`]
//! - [`apply::ApplyCoordinator`]: apply confirmation and status writes
//!
//! Dedup uses two identities on purpose: the store merges by `id`, the buffer
//! filters by `url`.

pub mod apply;
pub mod buffer;
pub mod classify;
pub mod record;
pub mod store;
pub mod view;

pub use apply::{ApplyCoordinator, ApplyOutcome, StatusWrite};
pub use buffer::IncomingBuffer;
pub use classify::{classify_experience, ExperienceLevel};
pub use record::{JobId, JobRecord, JobStatus};
pub use store::ReconciliationStore;
pub use view::{project, ExperienceFilter, SortOrder, View, ViewConfig};
