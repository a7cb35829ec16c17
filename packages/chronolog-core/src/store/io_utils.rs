//! Error classification and retry policy for event log I/O.

use std::io::ErrorKind;
use std::time::Duration;

use crate::config::LogConfig;
use crate::error::LogError;

/// Maps an I/O failure on the event log (or config file) to a [`LogError`].
///
/// A short read means the log ends mid-frame and is reported as corruption;
/// a zero-length write means the device stopped accepting bytes.
pub fn classify_io_error(error: std::io::Error, context: &str) -> LogError {
    let message = format!("{}: {}", context, error);
    match error.kind() {
        ErrorKind::StorageFull | ErrorKind::WriteZero | ErrorKind::OutOfMemory => {
            LogError::DiskFull(message)
        }
        ErrorKind::UnexpectedEof | ErrorKind::InvalidData => LogError::DataCorruption(message),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            LogError::TransientIoError(message)
        }
        _ => LogError::IoError(message),
    }
}

/// How often, and how patiently, a batch append is retried.
///
/// Only [`LogError::TransientIoError`] is retried. The wait grows linearly:
/// `delay`, `2 * delay`, ... so a briefly busy disk gets more room each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            max_retries: config.persistence_max_retries,
            delay: Duration::from_millis(config.persistence_retry_delay_ms),
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    /// Runs `operation` until it succeeds, fails permanently or the retries
    /// are used up. Blocks the calling thread while waiting.
    pub fn run<F, T>(&self, context: &str, mut operation: F) -> Result<T, LogError>
    where
        F: FnMut() -> Result<T, LogError>,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(LogError::TransientIoError(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        "Transient I/O error in {} (retry {}/{} in {:?}): {}",
                        context,
                        attempt,
                        self.max_retries,
                        wait,
                        msg
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LogConfig::default())
    }
}
