//! Task state as tracked on the client

use crate::service::ResultReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier the service assigns to a submitted task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Status marker reported by the service.
///
/// Deployments differ in naming, so only the terminal markers are matched
/// exactly; everything unrecognised counts as in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Accepted but not started (`NEW`, `PENDING`, `QUEUED`)
    Pending,
    /// Being solved (`IN_PROGRESS`, `RUNNING`, anything unrecognised)
    InProgress,
    Done,
    Error,
    Cancelled,
}

impl From<&str> for ServerStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DONE" => ServerStatus::Done,
            "ERROR" => ServerStatus::Error,
            "CANCELLED" | "CANCELED" => ServerStatus::Cancelled,
            "NEW" | "PENDING" | "QUEUED" => ServerStatus::Pending,
            _ => ServerStatus::InProgress,
        }
    }
}

/// Lifecycle state of a task.
///
/// Terminal variants carry their payload, so a solution exists only for
/// `Done` and an error message only for `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Pending,
    Running,
    Done { solution: Vec<f64> },
    Error { message: String },
    TimedOut,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Done { .. }
                | TaskState::Error { .. }
                | TaskState::TimedOut
                | TaskState::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Done { .. } => "done",
            TaskState::Error { .. } => "error",
            TaskState::TimedOut => "timed out",
            TaskState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Error { message } => write!(f, "error: {}", message),
            other => f.write_str(other.label()),
        }
    }
}

/// A submitted task and what is known about it
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    state: TaskState,
    progress: u8,
}

impl Task {
    /// A freshly submitted task
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Pending,
            progress: 0,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Last progress reported by the service, 0-100
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn solution(&self) -> Option<&[f64]> {
        match &self.state {
            TaskState::Done { solution } => Some(solution),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            TaskState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Fold a status report into the task. Reports arriving after a terminal
    /// state are ignored. Returns whether anything changed.
    pub(crate) fn apply(&mut self, report: &ResultReport) -> bool {
        if self.is_terminal() {
            return false;
        }
        let before = (self.state.clone(), self.progress);

        match report.status() {
            ServerStatus::Done => match &report.solution {
                Some(solution) => {
                    self.progress = 100;
                    self.state = TaskState::Done {
                        solution: solution.clone(),
                    };
                }
                None => {
                    self.state = TaskState::Error {
                        message: "service reported DONE without a solution".to_string(),
                    };
                }
            },
            ServerStatus::Error => {
                self.state = TaskState::Error {
                    message: report
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                };
            }
            ServerStatus::Cancelled => {
                self.state = TaskState::Cancelled;
            }
            ServerStatus::Pending => {
                self.progress = report.progress();
                self.state = TaskState::Pending;
            }
            ServerStatus::InProgress => {
                self.progress = report.progress();
                self.state = TaskState::Running;
            }
        }

        (self.state.clone(), self.progress) != before
    }

    pub(crate) fn time_out(&mut self) {
        if !self.is_terminal() {
            self.state = TaskState::TimedOut;
        }
    }
}
