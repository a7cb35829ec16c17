//! Change log configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::store::io_utils::classify_io_error;

/// Change log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Data directory holding the event log
    pub data_dir: PathBuf,
    /// Interval between background flushes in milliseconds
    pub flush_interval_ms: u64,
    /// Pending record count that triggers an early flush
    pub batch_size_cap: usize,
    /// fsync the log after every committed batch
    pub sync_on_commit: bool,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
    /// Row limit used when a query does not specify one
    pub default_query_limit: usize,
    /// Idle time after which an inspection session expires, in seconds
    pub inspector_ttl_secs: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            flush_interval_ms: 1000,
            batch_size_cap: 128,
            sync_on_commit: true,
            persistence_max_retries: 3,      // Default retry attempts
            persistence_retry_delay_ms: 100, // 100ms delay between retries
            default_query_limit: 100,
            inspector_ttl_secs: 600, // 10 minutes
        }
    }
}

impl LogConfig {
    /// Loads a JSON configuration file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| classify_io_error(e, "Failed to read config file"))?;
        let config: LogConfig = serde_json::from_str(&contents).map_err(|e| {
            LogError::SerializationError(format!(
                "Failed to parse config {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            return Err(LogError::InvalidInput(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.batch_size_cap == 0 {
            return Err(LogError::InvalidInput(
                "batch_size_cap must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn inspector_ttl(&self) -> Duration {
        Duration::from_secs(self.inspector_ttl_secs)
    }

    /// Path of the event log inside the data directory.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(crate::store::LOG_FILE_NAME)
    }
}
