use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::FeedError;
use crate::feed::apply::{ApplyOutcome, StatusWrite};
use crate::feed::classify::ExperienceLevel;
use crate::feed::record::{time_ago, JobId, JobRecord, JobStatus};
use crate::feed::view::{ExperienceFilter, SortOrder, TabCounts, ViewConfig};
use crate::session::FeedSession;

#[derive(Clone)]
pub struct DashboardState {
    pub session: Arc<FeedSession>,
}

/// Query string of `GET /api/view`. `sources` is comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub tab: Option<String>,
    pub experience: Option<String>,
    pub search: Option<String>,
    pub sources: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl ViewQuery {
    pub fn into_config(self) -> Result<ViewConfig, FeedError> {
        let mut config = ViewConfig::default();
        if let Some(size) = self.page_size {
            config = config.with_page_size(size)?;
        }
        if let Some(tab) = self.tab {
            config = config.with_tab(tab.parse::<JobStatus>()?);
        }
        if let Some(experience) = self.experience {
            config = config.with_experience(experience.parse::<ExperienceFilter>()?);
        }
        if let Some(sort) = self.sort {
            config = config.with_sort(sort.parse::<SortOrder>()?);
        }
        if let Some(search) = self.search {
            config = config.with_search(&search);
        }
        for source in self.sources.iter().flat_map(|s| s.split(',')) {
            let source = source.trim();
            if !source.is_empty() {
                config = config.with_source(source);
            }
        }
        if let Some(page) = self.page {
            config = config.with_page(page);
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct JobItem {
    #[serde(flatten)]
    record: JobRecord,
    experience: ExperienceLevel,
    posted_ago: String,
}

#[derive(Serialize)]
struct ViewResponse {
    items: Vec<JobItem>,
    total_matching: usize,
    total_records: usize,
    page: usize,
    page_size: usize,
    page_count: usize,
    tab_counts: TabCounts,
}

#[derive(Serialize)]
struct FlushResponse {
    merged: usize,
}

#[derive(Serialize)]
struct ApplyResponse {
    id: JobId,
    url: String,
    superseded: Option<JobId>,
}

#[derive(Deserialize)]
struct ConfirmRequest {
    outcome: ApplyOutcome,
}

#[derive(Serialize)]
struct ConfirmResponse {
    write: Option<StatusWrite>,
}

/// `FeedError` as an HTTP response.
pub struct ApiError(FeedError);

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            FeedError::JobNotFound(_) => StatusCode::NOT_FOUND,
            FeedError::AlreadyApplied(_)
            | FeedError::NoPendingConfirmation
            | FeedError::NoFailedWrite(_) => StatusCode::CONFLICT,
            FeedError::InvalidPageSize(_) | FeedError::InvalidValue { .. } => {
                StatusCode::BAD_REQUEST
            }
            FeedError::Http(_)
            | FeedError::Backend { .. }
            | FeedError::WebSocket(_)
            | FeedError::Stomp(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/view", get(view_handler))
        .route("/api/status", get(status_handler))
        .route("/api/flush", post(flush_handler))
        .route("/api/jobs/{id}/apply", post(apply_handler))
        .route("/api/jobs/{id}/retry", post(retry_handler))
        .route("/api/jobs/{id}/failed-write", delete(dismiss_handler))
        .route("/api/confirm", post(confirm_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState, shutdown: CancellationToken) {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn view_handler(
    State(state): State<DashboardState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ViewResponse>, ApiError> {
    let config = query.into_config()?;
    let mut view = state.session.view(&config).await;

    // Filters can shrink the result below the requested page; show the last one.
    if view.past_end {
        let last = view.page_count.max(1);
        view = state.session.view(&config.with_page(last)).await;
    }

    let now = Utc::now();
    let items = view
        .items
        .into_iter()
        .map(|record| JobItem {
            experience: record.experience(),
            posted_ago: time_ago(record.posted_at.as_deref(), now),
            record,
        })
        .collect();

    Ok(Json(ViewResponse {
        items,
        total_matching: view.total_matching,
        total_records: view.total_records,
        page: view.page,
        page_size: view.page_size,
        page_count: view.page_count,
        tab_counts: view.tab_counts,
    }))
}

async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.session.status().await)
}

async fn flush_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let merged = state.session.flush().await;
    Json(FlushResponse { merged })
}

async fn apply_handler(
    State(state): State<DashboardState>,
    Path(id): Path<JobId>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let started = state.session.apply(id).await?;
    Ok(Json(ApplyResponse {
        id: started.pending.id,
        url: started.pending.url,
        superseded: started.superseded,
    }))
}

async fn confirm_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let write = state.session.confirm(payload.outcome).await?;
    Ok(Json(ConfirmResponse { write }))
}

async fn retry_handler(
    State(state): State<DashboardState>,
    Path(id): Path<JobId>,
) -> Result<Json<StatusWrite>, ApiError> {
    Ok(Json(state.session.retry(id).await?))
}

async fn dismiss_handler(
    State(state): State<DashboardState>,
    Path(id): Path<JobId>,
) -> Result<StatusCode, ApiError> {
    state.session.dismiss(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
