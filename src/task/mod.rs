/// Task executor implementations
pub mod executor;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;

/// Error type an operation may fail with
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

type Operation = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), OperationError>> + Send>;

/// A unit of deferred work
pub struct Task {
    /// Caller-supplied identifier, used for logging only; not required to be unique
    pub id: String,

    /// Time the task was submitted to a queue
    pub enqueued_at: DateTime<Utc>,

    /// Per-task deadline; overrides the executor's default when set
    pub timeout: Option<Duration>,

    operation: Operation,
}

impl Task {
    /// Create a new task from a zero-argument async operation.
    ///
    /// The closure isn't invoked until the task is dispatched.
    pub fn new<F, Fut, E>(id: impl Into<String>, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<OperationError> + 'static,
    {
        Self {
            id: id.into(),
            enqueued_at: Utc::now(),
            timeout: None,
            operation: Box::new(move || {
                async move { operation().await.map_err(Into::into) }.boxed()
            }),
        }
    }

    /// Set a deadline for this task (chainable)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stamp the submission time
    pub(crate) fn mark_enqueued(&mut self) {
        self.enqueued_at = Utc::now();
    }

    /// Milliseconds since the task was submitted
    pub fn age_millis(&self) -> i64 {
        (Utc::now() - self.enqueued_at).num_milliseconds()
    }

    /// Consume the task and start its operation
    pub fn run(self) -> BoxFuture<'static, Result<(), OperationError>> {
        (self.operation)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// How a task settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Operation returned `Ok(())`
    Succeeded,

    /// Operation returned an error
    Failed {
        /// Rendered error
        message: String,
    },

    /// Operation exceeded its deadline and was dropped
    TimedOut {
        /// The deadline that elapsed
        after: Duration,
    },

    /// Operation panicked
    Panicked {
        /// Panic payload, if it was a string
        message: String,
    },

    /// Task was submitted to a closed queue and never ran
    Rejected,

    /// The runtime went away before the task settled
    Abandoned,
}

impl TaskOutcome {
    /// Whether the operation completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }

    /// Convert into a `Result`, attributing any failure to `id`
    pub fn into_result(self, id: &str) -> crate::Result<()> {
        let id = id.to_string();
        match self {
            TaskOutcome::Succeeded => Ok(()),
            TaskOutcome::Failed { message } => {
                Err(crate::BackgroundQueueError::TaskFailed { id, message })
            }
            TaskOutcome::TimedOut { after } => {
                Err(crate::BackgroundQueueError::TaskTimedOut { id, after })
            }
            TaskOutcome::Panicked { message } => {
                Err(crate::BackgroundQueueError::TaskPanicked { id, message })
            }
            TaskOutcome::Rejected => Err(crate::BackgroundQueueError::Rejected(id)),
            TaskOutcome::Abandoned => Err(crate::BackgroundQueueError::TaskFailed {
                id,
                message: "task abandoned before settling".to_string(),
            }),
        }
    }
}

/// Resolves with the outcome of one submitted task.
///
/// Dropping the handle has no effect on the task.
#[derive(Debug)]
pub struct TaskHandle {
    id: String,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub(crate) fn channel(id: &str) -> (oneshot::Sender<TaskOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                id: id.to_string(),
                rx,
            },
        )
    }

    /// Id of the task this handle tracks
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the task to settle
    pub async fn outcome(self) -> TaskOutcome {
        self.rx.await.unwrap_or(TaskOutcome::Abandoned)
    }

    /// Wait for the task to settle and convert its outcome into a `Result`
    pub async fn wait(self) -> crate::Result<()> {
        let id = self.id.clone();
        self.outcome().await.into_result(&id)
    }

    /// Non-blocking check; `None` while the task is still queued or running
    pub fn try_outcome(&mut self) -> Option<TaskOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(TaskOutcome::Abandoned),
        }
    }
}
