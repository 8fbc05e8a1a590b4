//! Status polling for submitted tasks
//!
//! The engine issues one status query at a time, waits a fixed interval
//! between queries and gives up once the absolute budget measured from
//! submission is spent. Failed queries are retried on the next tick.

use crate::service::SolverService;
use crate::task::Task;
use crate::ClientConfig;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Polling cadence and budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between consecutive status queries
    pub interval: Duration,
    /// Wall-clock budget measured from submission
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ClientConfig> for PollConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }
}

/// Drives one task from submission to a terminal state
pub struct Poller<S: SolverService + ?Sized> {
    service: Arc<S>,
    config: PollConfig,
}

impl<S: SolverService + ?Sized> Poller<S> {
    pub fn new(service: Arc<S>, config: PollConfig) -> Self {
        Self { service, config }
    }

    /// Poll until the task is terminal.
    ///
    /// `on_update` sees the task after every successful query and once more
    /// on timeout. Returning `ControlFlow::Break` abandons the loop without
    /// further queries; the task is returned as last observed.
    pub async fn run<F>(&self, mut task: Task, submitted_at: Instant, mut on_update: F) -> Task
    where
        F: FnMut(&Task) -> ControlFlow<()>,
    {
        let mut attempt: u32 = 0;

        loop {
            if task.is_terminal() {
                return task;
            }

            sleep(self.config.interval).await;

            let elapsed = submitted_at.elapsed();
            if elapsed > self.config.timeout {
                return self.expire(task, &mut on_update);
            }

            attempt += 1;
            let remaining = self.config.timeout - elapsed;
            let report = match timeout(remaining, self.service.fetch_result(task.id())).await {
                Err(_) => return self.expire(task, &mut on_update),
                Ok(Err(e)) => {
                    debug!(
                        task_id = %task.id(),
                        attempt,
                        error = %e,
                        "Status query failed, retrying"
                    );
                    continue;
                }
                Ok(Ok(report)) => report,
            };

            if task.apply(&report) {
                debug!(
                    task_id = %task.id(),
                    attempt,
                    state = task.state().label(),
                    progress = task.progress(),
                    "Task updated"
                );
            }

            if on_update(&task).is_break() {
                debug!(task_id = %task.id(), "Polling abandoned");
                return task;
            }

            if task.is_terminal() {
                info!(
                    task_id = %task.id(),
                    attempts = attempt,
                    state = task.state().label(),
                    "Task finished"
                );
            }
        }
    }

    fn expire<F>(&self, mut task: Task, on_update: &mut F) -> Task
    where
        F: FnMut(&Task) -> ControlFlow<()>,
    {
        warn!(
            task_id = %task.id(),
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Task timed out"
        );
        task.time_out();
        let _ = on_update(&task);
        task
    }
}
