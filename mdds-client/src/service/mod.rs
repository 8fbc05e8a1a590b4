//! Remote solving service abstraction and implementations

mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpSolverService;

use crate::request::SolveRequest;
use crate::task::{ServerStatus, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the solving service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered with a non-success status
    #[error(
        "service rejected the request (HTTP {status}): {}",
        .message.as_deref().unwrap_or("no details")
    )]
    Rejected { status: u16, message: Option<String> },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response did not contain a task id")]
    MissingTaskId,
}

impl ServiceError {
    /// HTTP status of a rejected request
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures where the service never gave a usable answer
    pub fn is_transport(&self) -> bool {
        !matches!(self, ServiceError::Rejected { .. })
    }
}

/// Body of a successful `POST /solve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Body the service attaches to rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Body of `GET /result/{taskId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Raw status marker, see [`ServerStatus`]
    #[serde(default, alias = "status")]
    pub task_status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,

    /// Present only when the task is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Vec<f64>>,

    /// Present only when the task failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_task_started: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time_task_ended: Option<serde_json::Value>,
}

impl ResultReport {
    fn with_status(status: &str) -> Self {
        Self {
            task_id: None,
            task_status: status.to_string(),
            progress: None,
            solution: None,
            error_message: None,
            date_time_task_started: None,
            date_time_task_ended: None,
        }
    }

    pub fn pending() -> Self {
        Self::with_status("NEW")
    }

    pub fn in_progress(progress: i64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::with_status("IN_PROGRESS")
        }
    }

    pub fn done(solution: Vec<f64>) -> Self {
        Self {
            progress: Some(100),
            solution: Some(solution),
            ..Self::with_status("DONE")
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::with_status("ERROR")
        }
    }

    pub fn cancelled() -> Self {
        Self::with_status("CANCELLED")
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus::from(self.task_status.as_str())
    }

    /// Reported progress clamped to 0-100, 0 when absent
    pub fn progress(&self) -> u8 {
        self.progress.unwrap_or(0).clamp(0, 100) as u8
    }
}

/// Health status of the service
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Trait for solving service backends
#[async_trait]
pub trait SolverService: Send + Sync {
    /// Name for logging/identification
    fn name(&self) -> &str;

    /// Submit a solve request and return the id of the created task
    async fn submit(&self, request: &SolveRequest) -> Result<TaskId, ServiceError>;

    /// Query the current status of a task
    async fn fetch_result(&self, task_id: &TaskId) -> Result<ResultReport, ServiceError>;

    /// Ask the service to cancel a task
    async fn cancel(&self, task_id: &TaskId) -> Result<(), ServiceError>;

    /// Check if the service is reachable
    async fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_report_from_server_json() {
        let report: ResultReport = serde_json::from_value(json!({
            "taskId": "abc",
            "dateTimeTaskStarted": "2025-01-01T10:00:00Z",
            "dateTimeTaskEnded": null,
            "taskStatus": "IN_PROGRESS",
            "cancelQueueName": "cancel.queue-1",
            "progress": 30,
            "solution": null,
            "errorMessage": null
        }))
        .unwrap();
        assert_eq!(report.status(), ServerStatus::InProgress);
        assert_eq!(report.progress(), 30);
        assert!(report.solution.is_none());
    }

    #[test]
    fn test_result_report_alternate_naming() {
        let report: ResultReport =
            serde_json::from_value(json!({ "status": "DONE", "solution": [1.0, -1.0] })).unwrap();
        assert_eq!(report.status(), ServerStatus::Done);
        assert_eq!(report.solution, Some(vec![1.0, -1.0]));
    }

    #[test]
    fn test_result_report_progress_defaults() {
        let report: ResultReport =
            serde_json::from_value(json!({ "taskStatus": "RUNNING" })).unwrap();
        assert_eq!(report.progress(), 0);
        assert_eq!(ResultReport::in_progress(-5).progress(), 0);
        assert_eq!(ResultReport::in_progress(101).progress(), 100);
    }

    #[test]
    fn test_error_classification() {
        let rejected = ServiceError::Rejected {
            status: 400,
            message: Some("Can not parse solving method".to_string()),
        };
        assert_eq!(rejected.status_code(), Some(400));
        assert!(!rejected.is_transport());
        assert!(rejected.to_string().contains("Can not parse solving method"));

        assert!(ServiceError::MissingTaskId.is_transport());
        assert_eq!(ServiceError::MissingTaskId.status_code(), None);
    }
}
