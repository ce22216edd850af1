use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use jobfeed::error::{FeedError, Result};
use jobfeed::feed::apply::ApplyOutcome;
use jobfeed::feed::view::ViewConfig;
use jobfeed::feed::{JobId, JobRecord, JobStatus};
use jobfeed::launcher::UrlOpener;
use jobfeed::session::{FeedSession, LoadState, SessionEvent};
use jobfeed::upstream::{ChannelEvent, JobBackend, LinkState};

/// In-memory backend that records status writes.
#[derive(Default)]
struct FakeBackend {
    jobs: Vec<JobRecord>,
    fail_fetch: bool,
    fail_updates: Mutex<bool>,
    updates: Mutex<Vec<(JobId, JobStatus)>>,
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn fetch_all(&self) -> Result<Vec<JobRecord>> {
        if self.fail_fetch {
            return Err(FeedError::Backend {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.jobs.clone())
    }

    async fn update_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        self.updates.lock().unwrap().push((id, status));
        if *self.fail_updates.lock().unwrap() {
            return Err(FeedError::Backend {
                status: 500,
                body: "write rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }
}

fn job(id: i64, url: &str) -> JobRecord {
    JobRecord::new(id, &format!("Job {}", id), "Acme", url).with_posted_at("2024-05-01")
}

struct Harness {
    session: Arc<FeedSession>,
    events_rx: mpsc::Receiver<SessionEvent>,
    backend: Arc<FakeBackend>,
    opener: Arc<RecordingOpener>,
}

fn harness(backend: FakeBackend) -> Harness {
    let backend = Arc::new(backend);
    let opener = Arc::new(RecordingOpener::default());
    let (session, events_rx) = FeedSession::new(backend.clone(), opener.clone(), 16);
    Harness {
        session: Arc::new(session),
        events_rx,
        backend,
        opener,
    }
}

async fn loaded(records: Vec<JobRecord>) -> Harness {
    let h = harness(FakeBackend::default());
    h.session
        .handle_event(SessionEvent::BulkLoaded(Ok(records)))
        .await;
    h
}

/// Wait for the next dispatched event and apply it.
async fn pump(h: &mut Harness) {
    let event = tokio::time::timeout(Duration::from_secs(5), h.events_rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed");
    h.session.handle_event(event).await;
}

#[tokio::test]
async fn test_initial_state() {
    let h = harness(FakeBackend::default());
    let status = h.session.status().await;

    assert_eq!(status.load, LoadState::Loading);
    assert_eq!(status.link, LinkState::Connecting);
    assert_eq!(status.scanning_status, "Initializing...");
    assert_eq!(status.buffered, 0);
    assert!(status.awaiting.is_none());
}

#[tokio::test]
async fn test_bulk_load_then_push_dedup_scenario() {
    let h = loaded(vec![
        job(1, "https://jobs/1"),
        job(2, "https://jobs/2"),
        job(3, "https://jobs/3"),
    ])
    .await;

    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Jobs(vec![job(
            20,
            "https://jobs/2",
        )])))
        .await;

    let status = h.session.status().await;
    assert_eq!(status.load, LoadState::Ready);
    assert_eq!(status.total_records, 3);
    assert_eq!(status.buffered, 0);
}

#[tokio::test]
async fn test_push_buffered_until_flush() {
    let h = loaded(vec![job(1, "https://jobs/1")]).await;

    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Jobs(vec![
            job(2, "https://jobs/2"),
            job(3, "https://jobs/3"),
        ])))
        .await;

    assert_eq!(h.session.status().await.buffered, 2);
    assert_eq!(h.session.view(&ViewConfig::default()).await.total_matching, 1);

    let merged = h.session.flush().await;

    assert_eq!(merged, 2);
    let status = h.session.status().await;
    assert_eq!(status.buffered, 0);
    assert_eq!(status.total_records, 3);
}

#[tokio::test]
async fn test_push_before_bulk_load_does_not_duplicate() {
    let h = harness(FakeBackend::default());

    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Jobs(vec![job(
            1,
            "https://jobs/1",
        )])))
        .await;
    h.session
        .handle_event(SessionEvent::BulkLoaded(Ok(vec![job(1, "https://jobs/1")])))
        .await;

    assert_eq!(h.session.status().await.buffered, 0);
    assert_eq!(h.session.flush().await, 0);
    assert_eq!(h.session.status().await.total_records, 1);
}

#[tokio::test]
async fn test_bulk_load_failure_is_reported() {
    let h = harness(FakeBackend::default());

    h.session
        .handle_event(SessionEvent::BulkLoaded(Err("connection refused".to_string())))
        .await;

    assert_eq!(
        h.session.status().await.load,
        LoadState::Failed {
            error: "connection refused".to_string()
        }
    );
}

#[tokio::test]
async fn test_link_and_scanning_status() {
    let h = harness(FakeBackend::default());

    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Connected))
        .await;
    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Status(
            "Scanning Naukri...".to_string(),
        )))
        .await;
    let status = h.session.status().await;
    assert_eq!(status.link, LinkState::Live);
    assert_eq!(status.scanning_status, "Scanning Naukri...");

    h.session
        .handle_event(SessionEvent::Channel(ChannelEvent::Disconnected))
        .await;
    assert_eq!(h.session.status().await.link, LinkState::Connecting);
}

#[tokio::test]
async fn test_apply_opens_url_and_awaits_confirmation() {
    let h = loaded(vec![job(1, "https://jobs/1")]).await;

    let started = h.session.apply(1).await.unwrap();

    assert_eq!(started.pending.id, 1);
    assert_eq!(*h.opener.opened.lock().unwrap(), vec!["https://jobs/1"]);
    assert_eq!(h.session.status().await.awaiting.map(|p| p.id), Some(1));
}

#[tokio::test]
async fn test_apply_unknown_job() {
    let h = loaded(vec![job(1, "https://jobs/1")]).await;

    let result = h.session.apply(99).await;

    assert!(matches!(result, Err(FeedError::JobNotFound(99))));
    assert!(h.opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_applied_commits_after_backend_ack() {
    let mut h = loaded(vec![job(1, "https://jobs/1"), job(2, "https://jobs/2")]).await;

    h.session.apply(2).await.unwrap();
    let write = h
        .session
        .confirm(ApplyOutcome::Applied)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(write.id, 2);
    assert!(h.session.status().await.awaiting.is_none());

    pump(&mut h).await;

    assert_eq!(
        *h.backend.updates.lock().unwrap(),
        vec![(2, JobStatus::Applied)]
    );
    let new_tab = h.session.view(&ViewConfig::default()).await;
    let applied_tab = h
        .session
        .view(&ViewConfig::default().with_tab(JobStatus::Applied))
        .await;
    assert!(new_tab.items.iter().all(|r| r.id != 2));
    assert_eq!(applied_tab.items.len(), 1);
    assert_eq!(applied_tab.items[0].id, 2);
}

#[tokio::test]
async fn test_confirm_cancel_sends_nothing() {
    let h = loaded(vec![job(1, "https://jobs/1")]).await;

    h.session.apply(1).await.unwrap();
    let write = h.session.confirm(ApplyOutcome::Cancel).await.unwrap();

    assert!(write.is_none());
    assert!(h.session.status().await.awaiting.is_none());
    assert!(h.backend.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_write_then_retry() {
    let backend = FakeBackend {
        fail_updates: Mutex::new(true),
        ..Default::default()
    };
    let mut h = harness(backend);
    h.session
        .handle_event(SessionEvent::BulkLoaded(Ok(vec![job(1, "https://jobs/1")])))
        .await;

    h.session.apply(1).await.unwrap();
    h.session.confirm(ApplyOutcome::Draft).await.unwrap();
    pump(&mut h).await;

    let status = h.session.status().await;
    assert_eq!(status.failed_writes.len(), 1);
    assert_eq!(status.tab_counts.draft, 0);

    *h.backend.fail_updates.lock().unwrap() = false;
    let retried = h.session.retry(1).await.unwrap();
    assert_eq!(retried.status, JobStatus::Draft);
    pump(&mut h).await;

    let status = h.session.status().await;
    assert!(status.failed_writes.is_empty());
    assert_eq!(status.tab_counts.draft, 1);
    assert_eq!(h.backend.updates.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_dismiss_failed_write() {
    let backend = FakeBackend {
        fail_updates: Mutex::new(true),
        ..Default::default()
    };
    let mut h = harness(backend);
    h.session
        .handle_event(SessionEvent::BulkLoaded(Ok(vec![job(1, "https://jobs/1")])))
        .await;
    h.session.apply(1).await.unwrap();
    h.session.confirm(ApplyOutcome::Applied).await.unwrap();
    pump(&mut h).await;

    h.session.dismiss(1).await.unwrap();

    assert!(h.session.status().await.failed_writes.is_empty());
    assert!(matches!(
        h.session.dismiss(1).await,
        Err(FeedError::NoFailedWrite(1))
    ));
}

#[tokio::test]
async fn test_run_performs_bulk_load_and_stops_on_shutdown() {
    let backend = FakeBackend {
        jobs: vec![job(1, "https://jobs/1"), job(2, "https://jobs/2")],
        ..Default::default()
    };
    let h = harness(backend);
    let shutdown = CancellationToken::new();

    let session = h.session.clone();
    let events_rx = h.events_rx;
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { session.run(events_rx, None, token).await });

    let mut ready = false;
    for _ in 0..50 {
        if h.session.status().await.load == LoadState::Ready {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ready, "bulk load never applied");
    assert_eq!(h.session.status().await.total_records, 2);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("session did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_run_reports_failed_bulk_load() {
    let backend = FakeBackend {
        fail_fetch: true,
        ..Default::default()
    };
    let h = harness(backend);
    let shutdown = CancellationToken::new();

    let session = h.session.clone();
    let events_rx = h.events_rx;
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { session.run(events_rx, None, token).await });

    let mut failed = false;
    for _ in 0..50 {
        if matches!(h.session.status().await.load, LoadState::Failed { .. }) {
            failed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(failed, "fetch failure never surfaced");

    shutdown.cancel();
    handle.await.unwrap();
}
