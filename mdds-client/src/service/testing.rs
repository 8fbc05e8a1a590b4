//! Scripted in-memory service used by engine and session tests

use super::{HealthStatus, ResultReport, ServiceError, SolverService};
use crate::request::SolveRequest;
use crate::task::TaskId;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer to a status query
pub(crate) enum Step {
    Report(ResultReport),
    /// Fail the query the way a dropped connection would
    Fail,
    /// Answer only after the given delay
    Delayed(Duration, ResultReport),
}

#[derive(Default)]
pub(crate) struct ScriptedService {
    scripts: Mutex<HashMap<TaskId, VecDeque<Step>>>,
    queries: Mutex<HashMap<TaskId, usize>>,
    submissions: Mutex<Vec<SolveRequest>>,
    rejections: Mutex<VecDeque<ServiceError>>,
    cancels: Mutex<Vec<TaskId>>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue answers for a task. Once the script runs out every query
    /// answers `IN_PROGRESS` forever.
    pub(crate) fn script(&self, task_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(TaskId::from(task_id), steps.into());
    }

    /// Make the next submission fail with `error`
    pub(crate) fn reject_next(&self, error: ServiceError) {
        self.rejections.lock().unwrap().push_back(error);
    }

    pub(crate) fn query_count(&self, task_id: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .get(&TaskId::from(task_id))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub(crate) fn cancelled(&self) -> Vec<TaskId> {
        self.cancels.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolverService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, request: &SolveRequest) -> Result<TaskId, ServiceError> {
        if let Some(error) = self.rejections.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        Ok(TaskId::new(format!("task-{}", submissions.len())))
    }

    async fn fetch_result(&self, task_id: &TaskId) -> Result<ResultReport, ServiceError> {
        *self
            .queries
            .lock()
            .unwrap()
            .entry(task_id.clone())
            .or_insert(0) += 1;

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(|steps| steps.pop_front());

        match step {
            Some(Step::Report(report)) => Ok(report),
            Some(Step::Fail) => Err(ServiceError::Rejected {
                status: 503,
                message: Some("scripted failure".to_string()),
            }),
            Some(Step::Delayed(delay, report)) => {
                tokio::time::sleep(delay).await;
                Ok(report)
            }
            None => Ok(ResultReport::in_progress(0)),
        }
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<(), ServiceError> {
        self.cancels.lock().unwrap().push(task_id.clone());
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            latency_ms: Some(0),
            error: None,
        }
    }
}
