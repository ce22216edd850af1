use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{FeedError, Result};
use crate::feed::apply::{
    ApplyCoordinator, ApplyOutcome, ApplyStarted, PendingApply, StatusWrite, TrackedWrite,
};
use crate::feed::buffer::IncomingBuffer;
use crate::feed::record::{JobId, JobRecord};
use crate::feed::store::ReconciliationStore;
use crate::feed::view::{project, TabCounts, View, ViewConfig};
use crate::launcher::UrlOpener;
use crate::upstream::backend::JobBackend;
use crate::upstream::channel::{ChannelEvent, LinkState, RealtimeChannel};

/// Progress of the one-shot bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Loading,
    Ready,
    /// The bulk fetch failed; nothing retries it.
    Failed { error: String },
}

/// All mutable feed state. Every transition takes the write lock once, so
/// readers never see a half-applied event.
#[derive(Debug)]
pub struct FeedState {
    pub store: ReconciliationStore,
    pub buffer: IncomingBuffer,
    pub coordinator: ApplyCoordinator,
    pub link: LinkState,
    pub scanning_status: String,
    pub load: LoadState,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            store: ReconciliationStore::new(),
            buffer: IncomingBuffer::new(),
            coordinator: ApplyCoordinator::new(),
            link: LinkState::Connecting,
            scanning_status: "Initializing...".to_string(),
            load: LoadState::Loading,
        }
    }
}

/// Asynchronous inputs to the session.
#[derive(Debug)]
pub enum SessionEvent {
    BulkLoaded(std::result::Result<Vec<JobRecord>, String>),
    Channel(ChannelEvent),
    StatusWritten {
        write: StatusWrite,
        result: std::result::Result<(), String>,
    },
}

/// Snapshot of everything outside the projected list.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub load: LoadState,
    pub link: LinkState,
    pub scanning_status: String,
    pub buffered: usize,
    pub total_records: usize,
    pub sources: Vec<String>,
    pub tab_counts: TabCounts,
    pub awaiting: Option<PendingApply>,
    pub in_flight_writes: usize,
    pub failed_writes: Vec<TrackedWrite>,
}

/// Owns the feed state and wires it to the backend, the push channel and the
/// url opener.
pub struct FeedSession {
    pub state: Arc<RwLock<FeedState>>,
    backend: Arc<dyn JobBackend>,
    opener: Arc<dyn UrlOpener>,
    events_tx: mpsc::Sender<SessionEvent>,
    event_buffer: usize,
}

impl FeedSession {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        opener: Arc<dyn UrlOpener>,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let event_buffer = event_buffer.max(1);
        let (events_tx, events_rx) = mpsc::channel(event_buffer);
        let session = Self {
            state: Arc::new(RwLock::new(FeedState::default())),
            backend,
            opener,
            events_tx,
            event_buffer,
        };
        (session, events_rx)
    }

    /// Apply one asynchronous input atomically.
    pub async fn handle_event(&self, event: SessionEvent) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        match event {
            SessionEvent::BulkLoaded(Ok(records)) => {
                let kept = state.store.replace_all(records);
                let pruned = state.buffer.prune(&state.store);
                state.load = LoadState::Ready;
                tracing::info!(jobs = kept, pruned_buffered = pruned, "Initial job load applied");
            }
            SessionEvent::BulkLoaded(Err(error)) => {
                tracing::error!(error = %error, "Initial job load failed");
                state.load = LoadState::Failed { error };
            }
            SessionEvent::Channel(ChannelEvent::Connected) => {
                state.link = LinkState::Live;
                tracing::info!("Push channel live");
            }
            SessionEvent::Channel(ChannelEvent::Disconnected) => {
                state.link = LinkState::Connecting;
                tracing::warn!("Push channel down");
            }
            SessionEvent::Channel(ChannelEvent::Status(text)) => {
                state.scanning_status = text;
            }
            SessionEvent::Channel(ChannelEvent::Jobs(records)) => {
                let accepted = state.buffer.offer(records, &state.store);
                if accepted > 0 {
                    tracing::info!(accepted, buffered = state.buffer.len(), "New jobs available");
                }
            }
            SessionEvent::StatusWritten { write, result } => {
                state.coordinator.complete(write, result, &mut state.store);
            }
        }
    }

    pub async fn view(&self, config: &ViewConfig) -> View {
        let state = self.state.read().await;
        project(state.store.records(), config)
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        SessionStatus {
            load: state.load.clone(),
            link: state.link,
            scanning_status: state.scanning_status.clone(),
            buffered: state.buffer.len(),
            total_records: state.store.len(),
            sources: state.store.sources(),
            tab_counts: TabCounts::tally(state.store.records()),
            awaiting: state.coordinator.awaiting().cloned(),
            in_flight_writes: state.coordinator.in_flight(),
            failed_writes: state.coordinator.failed_writes(),
        }
    }

    /// Move every buffered record into the store. Returns how many were merged.
    pub async fn flush(&self) -> usize {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let pending = state.buffer.flush();
        let offered = pending.len();
        let merged = state.store.merge(pending);
        if offered > 0 {
            tracing::info!(offered, merged, "Flushed buffered jobs");
        }
        merged
    }

    /// Open a posting and wait for the user's confirmation.
    pub async fn apply(&self, id: JobId) -> Result<ApplyStarted> {
        let started = {
            let mut guard = self.state.write().await;
            let FeedState {
                store, coordinator, ..
            } = &mut *guard;
            let record = store.get(id).ok_or(FeedError::JobNotFound(id))?;
            coordinator.begin(record)?
        };
        self.opener.open(&started.pending.url);
        Ok(started)
    }

    /// Answer the pending confirmation; dispatches the status write if any.
    pub async fn confirm(&self, outcome: ApplyOutcome) -> Result<Option<StatusWrite>> {
        let write = self.state.write().await.coordinator.resolve(outcome)?;
        if let Some(write) = write {
            self.dispatch(write);
        }
        Ok(write)
    }

    pub async fn retry(&self, id: JobId) -> Result<StatusWrite> {
        let write = self.state.write().await.coordinator.retry(id)?;
        self.dispatch(write);
        Ok(write)
    }

    pub async fn dismiss(&self, id: JobId) -> Result<()> {
        self.state.write().await.coordinator.dismiss(id)
    }

    fn dispatch(&self, write: StatusWrite) {
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend
                .update_status(write.id, write.status)
                .await
                .map_err(|e| e.to_string());
            if tx
                .send(SessionEvent::StatusWritten { write, result })
                .await
                .is_err()
            {
                tracing::warn!(job_id = write.id, "Session gone, status write result dropped");
            }
        });
    }

    fn spawn_bulk_load(&self) {
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_all().await.map_err(|e| e.to_string());
            if tx.send(SessionEvent::BulkLoaded(result)).await.is_err() {
                tracing::warn!("Session gone, bulk load result dropped");
            }
        });
    }

    /// Run the session until `shutdown` fires.
    ///
    /// 1. Starts the bulk load
    /// 2. Subscribes to the push channel, if one is given
    /// 3. Applies events as they arrive
    ///
    /// Cancelling `shutdown` also tears down the channel subscription.
    pub async fn run(
        self: Arc<Self>,
        mut events_rx: mpsc::Receiver<SessionEvent>,
        channel: Option<RealtimeChannel>,
        shutdown: CancellationToken,
    ) {
        self.spawn_bulk_load();

        let (channel_tx, mut channel_rx) = mpsc::channel(self.event_buffer);
        let channel_handle = channel.map(|channel| {
            let token = shutdown.clone();
            tokio::spawn(async move { channel.run(channel_tx, token).await })
        });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = events_rx.recv() => self.handle_event(event).await,
                Some(event) = channel_rx.recv() => self.handle_event(SessionEvent::Channel(event)).await,
            }
        }

        if let Some(handle) = channel_handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Push channel task ended abnormally");
            }
        }
        tracing::info!("Feed session stopped");
    }
}
