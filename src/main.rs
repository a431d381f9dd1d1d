//! Background Queue demo binary

use background_queue::{config::Config, BackgroundQueue, Task};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Background Queue demo");

    let config = Config::load()?;
    info!(
        "Initialized with capacity {}, task timeout: {:?}",
        config.capacity,
        config.task_timeout()
    );

    let queue = BackgroundQueue::from_config(&config)?;

    for i in 0..8u64 {
        queue.submit(format!("job-{i}"), move || async move {
            tokio::time::sleep(Duration::from_millis(100 + 50 * (i % 3))).await;
            if i == 5 {
                return Err(format!("simulated failure in job-{i}"));
            }
            Ok(())
        });
    }

    let slow = queue.enqueue_tracked(
        Task::new("slow-job", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), String>(())
        })
        .with_timeout(Duration::from_millis(300)),
    );

    info!("Status after submission: {}", serde_json::to_string(&queue.status())?);

    if let Err(e) = slow.wait().await {
        warn!("{e}");
    }

    queue.shutdown(config.shutdown_timeout()).await?;
    info!("Final stats: {}", serde_json::to_string(&queue.stats())?);

    Ok(())
}
