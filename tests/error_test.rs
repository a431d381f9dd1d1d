use background_queue::BackgroundQueueError;

#[test]
fn test_error_types() {
    let err = BackgroundQueueError::NoRuntime;
    assert_eq!(err.to_string(), "No Tokio runtime available to spawn tasks onto");

    let err = BackgroundQueueError::ShutdownTimeout {
        queued: 2,
        processing: 1,
    };
    assert_eq!(
        err.to_string(),
        "Shutdown timeout exceeded with 2 queued and 1 processing"
    );

    let err = BackgroundQueueError::TaskFailed {
        id: "upload-7".to_string(),
        message: "checksum mismatch".to_string(),
    };
    assert_eq!(err.to_string(), "Task upload-7 failed: checksum mismatch");
}
