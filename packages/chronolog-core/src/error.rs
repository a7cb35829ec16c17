//! Change log error types.

use thiserror::Error;

use crate::region::Region;

/// Change log operation errors.
#[derive(Error, Debug, Clone)]
pub enum LogError {
    /// Caller supplied an argument that can never succeed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Region intersects a region that is already being restored
    #[error("Region {region} is locked by another restoration")]
    RegionLocked { region: Region },

    /// Region corners or world name are unusable
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Stored subject kind has no registered reconstruction
    #[error("Unknown subject kind '{kind}'")]
    UnknownSubjectKind { kind: String },

    /// Stored source name could not be resolved
    #[error("Unknown change source '{name}'")]
    UnknownSource { name: String },

    /// Stored reason string is not a known reason code
    #[error("Unknown change reason '{reason}'")]
    UnknownReason { reason: String },

    /// Builder finished without a required field
    #[error("Change record is missing field '{field}'")]
    MissingField { field: &'static str },

    /// I/O error during persistence
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIoError(String),

    /// Disk full error during persistence
    #[error("Disk full: {0}")]
    DiskFull(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Host world rejected a read or write
    #[error("World access failed at {world} ({x}, {y}, {z}): {message}")]
    WorldAccess {
        world: String,
        x: i32,
        y: i32,
        z: i32,
        message: String,
    },

    /// Background task or channel went away
    #[error("Channel closed")]
    ChannelClosed,

    /// Background task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl LogError {
    /// Returns `true` for conditions the caller may simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LogError::RegionLocked { .. } | LogError::TransientIoError(_)
        )
    }
}

impl From<serde_json::Error> for LogError {
    fn from(error: serde_json::Error) -> Self {
        LogError::SerializationError(error.to_string())
    }
}

/// Result type for change log operations
pub type Result<T> = std::result::Result<T, LogError>;
