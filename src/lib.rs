//! Background Queue - a bounded-concurrency in-process task queue
//!
//! Callers submit named asynchronous operations; the queue runs at most
//! `capacity` of them at once and admits the rest from a FIFO backlog as
//! slots free up. Failures are isolated per task and logged.

/// Configuration management for the queue
pub mod config;
/// The queue itself and its dispatch bookkeeping
pub mod queue;
/// Task definitions and execution logic
pub mod task;

pub use config::Config;
pub use queue::{BackgroundQueue, QueueStats, QueueStatus, DEFAULT_CAPACITY};
pub use task::executor::{DefaultExecutor, TaskExecutor};
pub use task::{Task, TaskHandle, TaskOutcome};

use std::time::Duration;
use thiserror::Error;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, BackgroundQueueError>;

/// Error types for the background queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackgroundQueueError {
    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The queue was constructed outside a Tokio runtime
    #[error("No Tokio runtime available to spawn tasks onto")]
    NoRuntime,

    /// Task operation returned an error
    #[error("Task {id} failed: {message}")]
    TaskFailed {
        /// Caller-supplied task id
        id: String,
        /// Rendered error
        message: String,
    },

    /// Task exceeded its deadline
    #[error("Task {id} timed out after {after:?}")]
    TaskTimedOut {
        /// Caller-supplied task id
        id: String,
        /// The deadline that elapsed
        after: Duration,
    },

    /// Task panicked while running
    #[error("Task {id} panicked: {message}")]
    TaskPanicked {
        /// Caller-supplied task id
        id: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Task was submitted after the queue stopped accepting work
    #[error("Task {0} rejected: queue is closed")]
    Rejected(String),

    /// Shutdown deadline elapsed with work still pending
    #[error("Shutdown timeout exceeded with {queued} queued and {processing} processing")]
    ShutdownTimeout {
        /// Tasks still in the backlog
        queued: usize,
        /// Tasks still running
        processing: usize,
    },
}
