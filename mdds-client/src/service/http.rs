//! HTTP implementation of the solving service client

use super::{ErrorResponse, HealthStatus, ResultReport, ServiceError, SolverService, TaskIdResponse};
use crate::request::SolveRequest;
use crate::task::TaskId;
use crate::ClientConfig;
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Client for the MDDS web server (`/solve`, `/result`, `/cancel`, `/health`)
pub struct HttpSolverService {
    client: Client,
    base_url: String,
    name: String,
}

impl HttpSolverService {
    /// Create a client with the default 10 second request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a client whose individual requests give up after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let name = format!("mdds:{}", base_url);

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
            name,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceError> {
        Self::with_timeout(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into a `Rejected` error, keeping the
/// service's message when it sent one
async fn rejection(response: Response) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

    ServiceError::Rejected { status, message }
}

#[async_trait]
impl SolverService for HttpSolverService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &SolveRequest) -> Result<TaskId, ServiceError> {
        let url = self.url("/solve");
        debug!(
            url = %url,
            method = %request.method,
            rows = request.matrix.row_count(),
            rhs_len = request.rhs.len(),
            "Submitting solve request"
        );

        let response = self.client.post(&url).json(&request.body()).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body = response.text().await?;
        let parsed: TaskIdResponse = serde_json::from_str(&body)?;
        let id = parsed
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ServiceError::MissingTaskId)?;

        info!(task_id = %id, "Task accepted");
        Ok(TaskId::new(id))
    }

    async fn fetch_result(&self, task_id: &TaskId) -> Result<ResultReport, ServiceError> {
        let url = self.url(&format!("/result/{}", task_id));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<(), ServiceError> {
        let url = self.url(&format!("/cancel/{}", task_id));
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        info!(task_id = %task_id, "Cancellation requested");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let url = self.url("/health");
        let start = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus {
                healthy: true,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(response) => HealthStatus {
                healthy: false,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: Some(format!("HTTP {}", response.status())),
            },
            Err(e) => HealthStatus {
                healthy: false,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}
