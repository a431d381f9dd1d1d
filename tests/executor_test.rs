use async_trait::async_trait;
use background_queue::task::executor::{DefaultExecutor, TaskExecutor};
use background_queue::{BackgroundQueue, Task, TaskOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn test_executor_success() {
    let executor = DefaultExecutor::new();
    let task = Task::new("ok", || async { Ok::<(), String>(()) });

    assert_eq!(executor.execute(task).await, TaskOutcome::Succeeded);
}

#[tokio::test]
async fn test_executor_failure() {
    let executor = DefaultExecutor::new();
    let task = Task::new("bad", || async { Err::<(), _>("upstream 503".to_string()) });

    assert_eq!(
        executor.execute(task).await,
        TaskOutcome::Failed {
            message: "upstream 503".to_string()
        }
    );
}

#[tokio::test]
async fn test_executor_catches_panic() {
    let executor = DefaultExecutor::new();
    let task = Task::new("panics", || async {
        let values: Vec<u32> = Vec::new();
        let _ = values[3];
        Ok::<(), String>(())
    });

    match executor.execute(task).await {
        TaskOutcome::Panicked { message } => assert!(message.contains("index out of bounds")),
        other => panic!("expected panic outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_executor_default_timeout() {
    let executor = DefaultExecutor::with_timeout(Duration::from_millis(30));
    assert_eq!(executor.default_timeout(), Some(Duration::from_millis(30)));

    let task = Task::new("slow", || async {
        sleep(Duration::from_secs(10)).await;
        Ok::<(), String>(())
    });

    assert_eq!(
        executor.execute(task).await,
        TaskOutcome::TimedOut {
            after: Duration::from_millis(30)
        }
    );
}

#[tokio::test]
async fn test_executor_without_timeout_waits() {
    let executor = DefaultExecutor::new();
    let task = Task::new("patient", || async {
        sleep(Duration::from_millis(50)).await;
        Ok::<(), String>(())
    });

    assert!(executor.execute(task).await.is_success());
}

/// Counts executions and delegates to the default executor
struct CountingExecutor {
    runs: AtomicUsize,
    inner: DefaultExecutor,
}

#[async_trait]
impl TaskExecutor for CountingExecutor {
    async fn execute(&self, task: Task) -> TaskOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(task).await
    }
}

#[tokio::test]
async fn test_queue_uses_custom_executor() {
    let executor = Arc::new(CountingExecutor {
        runs: AtomicUsize::new(0),
        inner: DefaultExecutor::new(),
    });
    let queue = BackgroundQueue::with_executor(2, executor.clone()).unwrap();

    for i in 0..4 {
        queue.submit(format!("job-{i}"), || async { Ok::<(), String>(()) });
    }
    queue.wait_idle().await;

    assert_eq!(executor.runs.load(Ordering::SeqCst), 4);
}

/// Executor that panics outside of the task's own future
struct BrokenExecutor;

#[async_trait]
impl TaskExecutor for BrokenExecutor {
    async fn execute(&self, task: Task) -> TaskOutcome {
        panic!("executor bug while running {}", task.id);
    }
}

#[tokio::test]
async fn test_executor_panic_still_frees_slot() {
    let queue = BackgroundQueue::with_executor(1, Arc::new(BrokenExecutor)).unwrap();

    let first = queue.submit_tracked("a", || async { Ok::<(), String>(()) });
    let second = queue.submit_tracked("b", || async { Ok::<(), String>(()) });

    assert_eq!(
        first.outcome().await,
        TaskOutcome::Panicked {
            message: "executor bug while running a".to_string()
        }
    );
    assert!(matches!(
        second.outcome().await,
        TaskOutcome::Panicked { .. }
    ));
    assert!(queue.is_idle());
}

/// Executor that reports outcomes only a queue itself should produce
struct MisreportingExecutor;

#[async_trait]
impl TaskExecutor for MisreportingExecutor {
    async fn execute(&self, task: Task) -> TaskOutcome {
        if task.id.starts_with("rejected") {
            TaskOutcome::Rejected
        } else {
            TaskOutcome::Abandoned
        }
    }
}

#[tokio::test]
async fn test_misreported_outcomes_count_as_failed() {
    let queue = BackgroundQueue::with_executor(1, Arc::new(MisreportingExecutor)).unwrap();

    let rejected = queue.submit_tracked("rejected-1", || async { Ok::<(), String>(()) });
    let abandoned = queue.submit_tracked("abandoned-1", || async { Ok::<(), String>(()) });

    assert_eq!(rejected.outcome().await, TaskOutcome::Rejected);
    assert_eq!(abandoned.outcome().await, TaskOutcome::Abandoned);

    let stats = queue.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.submitted, stats.settled() + stats.in_flight());
    assert!(queue.is_idle());
}
