use background_queue::{BackgroundQueue, BackgroundQueueError, TaskOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn test_graceful_shutdown_empty_queue() {
    let queue = BackgroundQueue::new(2).unwrap();

    let result = queue.shutdown(Duration::from_secs(5)).await;
    assert!(result.is_ok());
    assert!(!queue.is_accepting());
}

#[tokio::test]
async fn test_graceful_shutdown_drains_backlog() {
    let queue = BackgroundQueue::new(2).unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    for i in 0..5 {
        let done = Arc::clone(&done);
        queue.submit(format!("upload-{i}"), move || async move {
            sleep(Duration::from_millis(20)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
    }

    let result = queue.shutdown(Duration::from_secs(5)).await;
    assert!(result.is_ok());
    assert_eq!(done.load(Ordering::SeqCst), 5);
    assert!(queue.is_idle());
}

#[tokio::test]
async fn test_shutdown_timeout() {
    let queue = BackgroundQueue::new(1).unwrap();

    for i in 0..3 {
        queue.submit(format!("slow-{i}"), || async {
            sleep(Duration::from_secs(1)).await;
            Ok::<(), String>(())
        });
    }

    let result = queue.shutdown(Duration::from_millis(100)).await;
    assert_eq!(
        result,
        Err(BackgroundQueueError::ShutdownTimeout {
            queued: 2,
            processing: 1
        })
    );
}

#[tokio::test]
async fn test_submit_after_close_is_rejected() {
    let queue = BackgroundQueue::new(2).unwrap();
    queue.close();

    // fire-and-forget submit must not panic or error
    queue.submit("late", || async { Ok::<(), String>(()) });
    let handle = queue.submit_tracked("late-tracked", || async { Ok::<(), String>(()) });

    assert_eq!(handle.outcome().await, TaskOutcome::Rejected);

    let stats = queue.stats();
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.submitted, 0);
    assert!(queue.is_idle());
}

#[tokio::test]
async fn test_close_keeps_accepted_work_running() {
    let queue = BackgroundQueue::new(1).unwrap();

    let first = queue.submit_tracked("first", || async {
        sleep(Duration::from_millis(20)).await;
        Ok::<(), String>(())
    });
    let second = queue.submit_tracked("second", || async { Ok::<(), String>(()) });
    queue.close();

    assert!(first.outcome().await.is_success());
    assert!(second.outcome().await.is_success());
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let queue = BackgroundQueue::new(1).unwrap();

    queue.shutdown(Duration::from_secs(1)).await.unwrap();
    queue.shutdown(Duration::from_secs(1)).await.unwrap();
}
