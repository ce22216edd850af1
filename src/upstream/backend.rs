use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use crate::error::{FeedError, Result};
use crate::feed::record::{JobId, JobRecord, JobStatus};

/// The job aggregation service: bulk listing and status persistence.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Every record the backend knows about.
    async fn fetch_all(&self) -> Result<Vec<JobRecord>>;

    /// Persist a status change for one record.
    async fn update_status(&self, id: JobId, status: JobStatus) -> Result<()>;
}

/// [`JobBackend`] over the aggregator's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(FeedError::Backend { status, body })
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn fetch_all(&self) -> Result<Vec<JobRecord>> {
        let url = format!("{}/api/jobs", self.base_url);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        let jobs: Vec<JobRecord> = response.json().await?;
        tracing::info!(count = jobs.len(), "Fetched jobs from backend");
        Ok(jobs)
    }

    async fn update_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let url = format!("{}/api/jobs/{}/status", self.base_url, id);
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(status.as_str());
        Self::check(request.send().await?).await?;
        Ok(())
    }
}
