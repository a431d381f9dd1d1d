//! Executor

use crate::task::{Task, TaskOutcome};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Trait for executing tasks
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run a task to completion and classify how it settled.
    ///
    /// Implementations must not propagate the operation's failure.
    async fn execute(&self, task: Task) -> TaskOutcome;
}

/// Default task executor: applies deadlines, isolates panics, logs outcomes
#[derive(Debug, Clone, Default)]
pub struct DefaultExecutor {
    default_timeout: Option<Duration>,
}

impl DefaultExecutor {
    /// Create an executor with no default deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor that applies `timeout` to tasks without their own
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            default_timeout: Some(timeout),
        }
    }

    /// The deadline applied to tasks that don't set one
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}

#[async_trait]
impl TaskExecutor for DefaultExecutor {
    async fn execute(&self, task: Task) -> TaskOutcome {
        let id = task.id.clone();
        let limit = task.timeout.or(self.default_timeout);
        let running = AssertUnwindSafe(task.run()).catch_unwind();

        let result = match limit {
            Some(limit) => match timeout(limit, running).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(task_id = %id, "Task {} timed out after {:?}", id, limit);
                    return TaskOutcome::TimedOut { after: limit };
                }
            },
            None => running.await,
        };

        match result {
            Ok(Ok(())) => {
                debug!(task_id = %id, "Task {} completed successfully", id);
                TaskOutcome::Succeeded
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                error!(task_id = %id, error = %message, "Task {} failed", id);
                TaskOutcome::Failed { message }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task_id = %id, panic = %message, "Task {} panicked", id);
                TaskOutcome::Panicked { message }
            }
        }
    }
}

/// Render a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
