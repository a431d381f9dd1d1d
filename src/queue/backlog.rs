//! Backlog and active-set bookkeeping

use crate::queue::{QueueStats, QueueStatus};
use crate::task::{Task, TaskOutcome};
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use tracing::debug;

/// A task waiting in the backlog, tagged with its admission order
pub(crate) struct Entry {
    /// Internal sequence number; distinguishes tasks that share an id
    pub seq: u64,
    pub task: Task,
    pub notify: Option<oneshot::Sender<TaskOutcome>>,
}

/// Mutable queue state. Always accessed under the queue's lock.
pub(crate) struct QueueState {
    capacity: usize,
    backlog: VecDeque<Entry>,
    active: HashMap<u64, String>,
    accepting: bool,
    next_seq: u64,
    stats: QueueStats,
}

impl QueueState {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            backlog: VecDeque::new(),
            active: HashMap::with_capacity(capacity),
            accepting: true,
            next_seq: 0,
            stats: QueueStats::default(),
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Append a task to the back of the backlog
    pub fn push(&mut self, task: Task, notify: Option<oneshot::Sender<TaskOutcome>>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.submitted += 1;
        self.backlog.push_back(Entry { seq, task, notify });
        seq
    }

    pub fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    /// Move tasks from the head of the backlog into the active set until
    /// capacity is reached. The returned entries must be launched by the caller.
    pub fn take_dispatchable(&mut self) -> Vec<Entry> {
        let mut launched = Vec::new();
        while self.active.len() < self.capacity {
            let Some(entry) = self.backlog.pop_front() else {
                break;
            };
            debug!(
                task_id = %entry.task.id,
                waited_ms = entry.task.age_millis(),
                "Dispatching task {}",
                entry.task.id
            );
            self.active.insert(entry.seq, entry.task.id.clone());
            launched.push(entry);
        }
        launched
    }

    /// Remove a task from the active set and record how it settled
    pub fn settle(&mut self, seq: u64, outcome: &TaskOutcome) -> Option<String> {
        let id = self.active.remove(&seq)?;
        match outcome {
            TaskOutcome::Succeeded => self.stats.succeeded += 1,
            TaskOutcome::TimedOut { .. } => self.stats.timed_out += 1,
            TaskOutcome::Panicked { .. } => self.stats.panicked += 1,
            // a dispatched task was accepted, so `rejected` doesn't apply here
            TaskOutcome::Failed { .. } | TaskOutcome::Abandoned | TaskOutcome::Rejected => {
                self.stats.failed += 1
            }
        }
        Some(id)
    }

    pub fn is_idle(&self) -> bool {
        self.backlog.is_empty() && self.active.is_empty()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.backlog.len(),
            processing: self.active.len(),
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.backlog.len(),
            processing: self.active.len(),
            ..self.stats.clone()
        }
    }
}
