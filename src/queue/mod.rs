//! Bounded-concurrency background queue

/// Backlog and active-set bookkeeping
mod backlog;

use crate::config::Config;
use crate::task::executor::{panic_message, DefaultExecutor, TaskExecutor};
use crate::task::{OperationError, Task, TaskHandle, TaskOutcome};
use backlog::{Entry, QueueState};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

/// Capacity used when none is configured. Tune per deployment to match
/// what the downstream resource tolerates.
pub const DEFAULT_CAPACITY: usize = 3;

/// Point-in-time backlog and active counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Tasks waiting for a slot
    pub queued: usize,
    /// Tasks currently running
    pub processing: usize,
}

/// Cumulative counters since the queue was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks accepted into the backlog
    pub submitted: u64,
    /// Tasks whose operation returned `Ok(())`
    pub succeeded: u64,
    /// Tasks whose operation returned an error, or that were abandoned
    /// after dispatch
    pub failed: u64,
    /// Tasks that exceeded their deadline
    pub timed_out: u64,
    /// Tasks whose operation or executor panicked
    pub panicked: u64,
    /// Tasks turned away after `close`; never counted in `submitted`
    pub rejected: u64,
    /// Tasks waiting for a slot
    pub queued: usize,
    /// Tasks currently running
    pub processing: usize,
}

impl QueueStats {
    /// Tasks that reached a terminal state after running
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out + self.panicked
    }

    /// Tasks accepted but not yet settled
    pub fn in_flight(&self) -> u64 {
        (self.queued + self.processing) as u64
    }
}

struct Inner {
    capacity: usize,
    executor: Arc<dyn TaskExecutor>,
    runtime: Handle,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // state is only mutated by short, non-panicking sections
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs at most `capacity` submitted tasks at once, admitting the rest in
/// FIFO order as running tasks settle.
///
/// Cloning is cheap; clones share the same backlog and slots.
#[derive(Clone)]
pub struct BackgroundQueue {
    inner: Arc<Inner>,
}

impl BackgroundQueue {
    /// Create a queue with the default executor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(capacity: usize) -> crate::Result<Self> {
        Self::with_executor(capacity, Arc::new(DefaultExecutor::new()))
    }

    /// Create a queue with [`DEFAULT_CAPACITY`] and the default executor
    pub fn with_default_capacity() -> crate::Result<Self> {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Create a queue from configuration
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        config.validate()?;
        let executor = match config.task_timeout() {
            Some(timeout) => DefaultExecutor::with_timeout(timeout),
            None => DefaultExecutor::new(),
        };
        Self::with_executor(config.capacity, Arc::new(executor))
    }

    /// Create a queue with a custom executor
    pub fn with_executor(capacity: usize, executor: Arc<dyn TaskExecutor>) -> crate::Result<Self> {
        if capacity == 0 {
            return Err(crate::BackgroundQueueError::ConfigError(
                "Capacity must be greater than 0".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| crate::BackgroundQueueError::NoRuntime)?;

        debug!("Created background queue with capacity {}", capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                capacity,
                executor,
                runtime,
                state: Mutex::new(QueueState::new(capacity)),
                idle: Notify::new(),
            }),
        })
    }

    /// Maximum number of tasks that run at once
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Submit an operation and return immediately. Its outcome is only logged.
    pub fn submit<F, Fut, E>(&self, id: impl Into<String>, operation: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<OperationError> + 'static,
    {
        self.enqueue(Task::new(id, operation));
    }

    /// Submit an operation and get a handle that resolves when it settles
    pub fn submit_tracked<F, Fut, E>(&self, id: impl Into<String>, operation: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<OperationError> + 'static,
    {
        self.enqueue_tracked(Task::new(id, operation))
    }

    /// Submit a pre-built task, fire-and-forget
    pub fn enqueue(&self, task: Task) {
        self.push(task, None);
    }

    /// Submit a pre-built task and get a handle to its outcome
    pub fn enqueue_tracked(&self, task: Task) -> TaskHandle {
        let (tx, handle) = TaskHandle::channel(&task.id);
        self.push(task, Some(tx));
        handle
    }

    fn push(&self, mut task: Task, notify: Option<oneshot::Sender<TaskOutcome>>) {
        {
            let mut state = self.inner.lock();
            if !state.is_accepting() {
                state.record_rejected();
                drop(state);
                warn!(task_id = %task.id, "Queue is closed, rejecting task {}", task.id);
                if let Some(tx) = notify {
                    let _ = tx.send(TaskOutcome::Rejected);
                }
                return;
            }
            task.mark_enqueued();
            let seq = state.push(task, notify);
            debug!(seq, "Task enqueued ({} queued)", state.status().queued);
        }
        dispatch(&self.inner);
    }

    /// Current backlog length and active count
    pub fn status(&self) -> QueueStatus {
        self.inner.lock().status()
    }

    /// Cumulative counters plus current counts
    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats()
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.inner.lock().is_accepting()
    }

    /// Whether the backlog and active set are both empty
    pub fn is_idle(&self) -> bool {
        self.inner.lock().is_idle()
    }

    /// Wait until every accepted task has settled
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // register before checking so a settle in between isn't missed
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting new tasks. Already accepted tasks still run.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if state.is_accepting() {
            state.close();
            info!("Background queue closed to new tasks");
        }
    }

    /// Close the queue and wait for accepted work to drain
    pub async fn shutdown(&self, timeout_duration: Duration) -> crate::Result<()> {
        self.close();
        let status = self.status();
        info!(
            "Waiting for {} queued and {} running tasks (timeout: {:?})...",
            status.queued, status.processing, timeout_duration
        );

        match tokio::time::timeout(timeout_duration, self.wait_idle()).await {
            Ok(()) => {
                info!("Background queue drained");
                Ok(())
            }
            Err(_) => {
                let status = self.status();
                warn!(
                    "Shutdown timeout exceeded with {} queued and {} running tasks",
                    status.queued, status.processing
                );
                Err(crate::BackgroundQueueError::ShutdownTimeout {
                    queued: status.queued,
                    processing: status.processing,
                })
            }
        }
    }
}

/// Launch as many backlog tasks as there are free slots. The scan runs under
/// the state lock, so concurrent passes can't overfill the active set.
fn dispatch(inner: &Arc<Inner>) {
    let launched = inner.lock().take_dispatchable();
    for Entry { seq, task, notify } in launched {
        let slot = Slot {
            inner: Arc::clone(inner),
            seq,
            id: task.id.clone(),
            notify,
            settled: false,
        };
        inner.runtime.spawn(run_entry(slot, task));
    }
}

async fn run_entry(slot: Slot, task: Task) {
    let executor = Arc::clone(&slot.inner.executor);
    let outcome = AssertUnwindSafe(executor.execute(task))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(task_id = %slot.id, "Executor panicked while running task {}: {}", slot.id, message);
            TaskOutcome::Panicked { message }
        });

    slot.settle(outcome);
}

/// An occupied entry in the active set. Releases it exactly once, as
/// `Abandoned` if the running future is dropped before the task settles
/// (runtime shut down, or spawned onto a runtime that is already gone).
struct Slot {
    inner: Arc<Inner>,
    seq: u64,
    id: String,
    notify: Option<oneshot::Sender<TaskOutcome>>,
    settled: bool,
}

impl Slot {
    fn settle(mut self, outcome: TaskOutcome) {
        self.release(outcome);
    }

    fn release(&mut self, outcome: TaskOutcome) {
        self.settled = true;
        let idle = {
            let mut state = self.inner.lock();
            state.settle(self.seq, &outcome);
            state.is_idle()
        };
        debug!(task_id = %self.id, ?outcome, "Task {} settled", self.id);

        if let Some(tx) = self.notify.take() {
            let _ = tx.send(outcome);
        }

        if idle {
            self.inner.idle.notify_waiters();
        } else {
            dispatch(&self.inner);
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.settled {
            warn!(task_id = %self.id, "Task {} dropped before settling", self.id);
            self.release(TaskOutcome::Abandoned);
        }
    }
}
