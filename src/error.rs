use thiserror::Error;

use crate::feed::record::JobId;
use crate::feed::view::PAGE_SIZE_OPTIONS;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {0} is already applied")]
    AlreadyApplied(JobId),

    #[error("No apply confirmation is pending")]
    NoPendingConfirmation,

    #[error("No failed status write for job {0}")]
    NoFailedWrite(JobId),

    #[error("Invalid page size {0}, expected one of {opts:?}", opts = PAGE_SIZE_OPTIONS)]
    InvalidPageSize(usize),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("STOMP error: {0}")]
    Stomp(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
