//! Configuration

use crate::queue::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for a background queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Maximum number of tasks running at once
    pub capacity: usize,

    /// Default deadline applied to tasks that don't set their own
    pub task_timeout_secs: Option<u64>,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            task_timeout_secs: None,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Create a new configuration with a custom capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Set the default task timeout (chainable)
    pub fn with_task_timeout_secs(mut self, secs: u64) -> Self {
        self.task_timeout_secs = Some(secs);
        self
    }

    /// Load configuration from file, environment variables, or defaults
    pub fn load() -> crate::Result<Self> {
        if let Ok(config_path) = env::var("BACKGROUND_QUEUE_CONFIG") {
            info!("Loading config from BACKGROUND_QUEUE_CONFIG: {}", config_path);
            return Self::from_file(&config_path);
        }

        let default_paths = [
            "config.yaml",
            "config.toml",
            "config/config.yaml",
            "config/config.toml",
        ];

        for path in default_paths {
            if Path::new(path).exists() {
                info!("Loading config from: {}", path);
                return Self::from_file(path);
            }
        }

        if let Ok(config) = Self::from_env() {
            info!("Loaded config from environment variables");
            return Ok(config);
        }

        warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| {
                crate::BackgroundQueueError::ConfigError(format!(
                    "Failed to load config file: {}",
                    e
                ))
            })?;

        let config: Config = settings.try_deserialize().map_err(|e| {
            crate::BackgroundQueueError::ConfigError(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();
        let mut found_any = false;

        if let Ok(val) = env::var("BACKGROUND_QUEUE_CAPACITY") {
            config.capacity = val.parse().map_err(|e| {
                crate::BackgroundQueueError::ConfigError(format!("Invalid CAPACITY: {}", e))
            })?;
            found_any = true;
        }

        if let Ok(val) = env::var("BACKGROUND_QUEUE_TASK_TIMEOUT_SECS") {
            config.task_timeout_secs = Some(val.parse().map_err(|e| {
                crate::BackgroundQueueError::ConfigError(format!(
                    "Invalid TASK_TIMEOUT_SECS: {}",
                    e
                ))
            })?);
            found_any = true;
        }

        if let Ok(val) = env::var("BACKGROUND_QUEUE_SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown_timeout_secs = val.parse().map_err(|e| {
                crate::BackgroundQueueError::ConfigError(format!(
                    "Invalid SHUTDOWN_TIMEOUT_SECS: {}",
                    e
                ))
            })?;
            found_any = true;
        }

        if !found_any {
            return Err(crate::BackgroundQueueError::ConfigError(
                "No environment variables found".to_string(),
            ));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.capacity == 0 {
            return Err(crate::BackgroundQueueError::ConfigError(
                "Capacity must be greater than 0".to_string(),
            ));
        }

        if self.task_timeout_secs == Some(0) {
            return Err(crate::BackgroundQueueError::ConfigError(
                "Task timeout must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(crate::BackgroundQueueError::ConfigError(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Default task deadline, if one is configured
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    /// Graceful shutdown deadline
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
