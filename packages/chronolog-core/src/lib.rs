//! Core data model and durable storage for the chronolog change log.
//!
//! Provides regions and coordinates, immutable change records with their
//! subject and source registries, change sets, and the append-only change
//! store that batches are committed to.

pub mod change;
pub mod config;
pub mod error;
pub mod region;
pub mod store;
pub mod world;

pub use change::{
    ChangeQuery, ChangeReason, ChangeRecord, ChangeSet, ChangeSource, SourceRegistry, Subject,
    SubjectKind, SubjectRegistry,
};
pub use config::LogConfig;
pub use error::{LogError, Result};
pub use region::{BlockPos, ChunkKey, Region};
pub use store::{ChangeStore, FileRowStore, MemoryRowStore, RowStore, StoredRow};
pub use world::{CellState, MemoryWorld, WorldAccess};
