//! Single-task solve session
//!
//! A session owns at most one active task. Every submission starts a new
//! generation; the polling loop of a task is tagged with the generation it
//! was started under, and its updates are dropped once a newer submission
//! has begun.

use crate::artifact::{materialize, Artifact, ArtifactFormat, MaterializeError};
use crate::parser::{parse_matrix, parse_vector, Matrix, ParseError, Vector};
use crate::poller::{PollConfig, Poller};
use crate::request::{SolveRequest, SolverMethod};
use crate::service::{ServiceError, SolverService};
use crate::task::{Task, TaskId};
use std::ops::ControlFlow;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors surfaced to the user of a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("no active task")]
    NoActiveTask,

    #[error("task {0} has already finished")]
    AlreadyFinished(TaskId),
}

/// What observers of a session see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Bumped on every submission
    pub generation: u64,
    /// Task of the current generation, if its submission succeeded
    pub task: Option<Task>,
}

/// Accept `task` as the new state of generation `generation`, unless a newer
/// submission has started since.
fn publish(
    state: &watch::Sender<SessionSnapshot>,
    generation: u64,
    task: &Task,
) -> ControlFlow<()> {
    let mut current = true;
    state.send_if_modified(|snapshot| {
        if snapshot.generation != generation {
            current = false;
            return false;
        }
        if snapshot.task.as_ref() == Some(task) {
            return false;
        }
        snapshot.task = Some(task.clone());
        true
    });

    if current {
        ControlFlow::Continue(())
    } else {
        debug!(task_id = %task.id(), generation, "Discarding update for superseded task");
        ControlFlow::Break(())
    }
}

/// Client-side lifecycle of solve requests, one active task at a time
pub struct SolveSession<S: SolverService + ?Sized + 'static> {
    service: Arc<S>,
    poll_config: PollConfig,
    state: Arc<watch::Sender<SessionSnapshot>>,
    poll_handle: Option<JoinHandle<Task>>,
}

impl<S: SolverService + ?Sized + 'static> SolveSession<S> {
    pub fn new(service: Arc<S>, poll_config: PollConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            service,
            poll_config,
            state: Arc::new(state),
            poll_handle: None,
        }
    }

    /// Parse the raw texts and submit them. Parse failures abort before any
    /// network call is made.
    pub async fn submit_text(
        &mut self,
        matrix_text: &str,
        rhs_text: &str,
        method: SolverMethod,
    ) -> Result<TaskId, SessionError> {
        let matrix = parse_matrix(matrix_text)?;
        let rhs = parse_vector(rhs_text)?;
        self.submit(matrix, rhs, method).await
    }

    /// Submit a new solve request, discarding any previous task.
    ///
    /// On success the task starts in `Pending` and is polled in the
    /// background; on failure the session is left without a task.
    pub async fn submit(
        &mut self,
        matrix: Matrix,
        rhs: Vector,
        method: SolverMethod,
    ) -> Result<TaskId, SessionError> {
        let generation = self.begin_generation();
        let request = SolveRequest::build(matrix, rhs, method);
        let submitted_at = Instant::now();

        info!(
            generation,
            method = %method,
            rows = request.matrix.row_count(),
            columns = request.matrix.column_count(),
            rhs_len = request.rhs.len(),
            service = self.service.name(),
            "Submitting solve request"
        );

        let task_id = match self.service.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                warn!(generation, error = %e, "Submission failed");
                return Err(e.into());
            }
        };

        let task = Task::new(task_id.clone());
        if publish(&self.state, generation, &task).is_break() {
            return Ok(task_id);
        }

        let poller = Poller::new(Arc::clone(&self.service), self.poll_config);
        let state = Arc::clone(&self.state);
        self.poll_handle = Some(tokio::spawn(async move {
            poller
                .run(task, submitted_at, |t| publish(&state, generation, t))
                .await
        }));

        Ok(task_id)
    }

    /// Start a new generation: forget the current task and stop its loop
    fn begin_generation(&mut self) -> u64 {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.task = None;
            generation = snapshot.generation;
        });
        generation
    }

    /// Drop the current task, e.g. when the user leaves
    pub fn discard(&mut self) {
        let generation = self.begin_generation();
        debug!(generation, "Session cleared");
    }

    /// Current task, if any
    pub fn current_task(&self) -> Option<Task> {
        self.state.borrow().task.clone()
    }

    /// Observe every change of the session state
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Wait until the current task reaches a terminal state.
    ///
    /// Returns `None` if there is no task or it was replaced by a newer
    /// submission while waiting.
    pub async fn wait_for_terminal(&self) -> Option<Task> {
        let mut rx = self.state.subscribe();
        let generation = rx.borrow().generation;

        let snapshot = rx
            .wait_for(|s| {
                s.generation != generation || s.task.as_ref().map_or(true, Task::is_terminal)
            })
            .await
            .ok()?;

        if snapshot.generation != generation {
            return None;
        }
        snapshot.task.clone()
    }

    /// Ask the service to cancel the current task. The task turns
    /// `Cancelled` once the service reports it.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let task = self.current_task().ok_or(SessionError::NoActiveTask)?;
        if task.is_terminal() {
            return Err(SessionError::AlreadyFinished(task.id().clone()));
        }
        self.service.cancel(task.id()).await?;
        Ok(())
    }

    /// Build the download for the current task
    pub fn download(&self, format: ArtifactFormat) -> Result<Artifact, SessionError> {
        let task = self.current_task().ok_or(SessionError::NoActiveTask)?;
        Ok(materialize(&task, format)?)
    }
}

impl<S: SolverService + ?Sized + 'static> Drop for SolveSession<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
    }
}
