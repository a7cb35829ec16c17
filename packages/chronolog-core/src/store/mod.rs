//! Durable, queryable repository of change records.
//!
//! [`RowStore`] is the storage layer: it commits batches of [`StoredRow`]s as
//! single durable units and answers spatial scans. [`ChangeStore`] sits on top,
//! encoding records into rows through the batch protocol and decoding rows
//! back into records with its subject and source registries.

mod file;
mod index;
pub mod io_utils;
mod memory;
mod row;
mod table;

use std::ops::Range;
use std::sync::Arc;

use crate::change::{ChangeRecord, ChangeReason, ChangeQuery, SourceRegistry, SubjectRegistry};
use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::region::Region;

pub use file::{FileRowStore, LogReport};
pub use index::SpatialIndex;
pub use memory::MemoryRowStore;
pub use row::{StoredRow, MAX_KIND_LEN, MAX_WORLD_LEN};

/// File name of the event log inside the data directory.
pub const LOG_FILE_NAME: &str = "events.log";

/// Storage layer under the change store.
pub trait RowStore: Send + Sync {
    /// Durably commits `rows` as one unit, assigning consecutive event ids.
    ///
    /// Returns the ids assigned; an empty batch yields an empty range.
    fn append_rows(&self, rows: Vec<StoredRow>) -> Result<Range<u64>>;

    /// Rows inside `region` (world included) in event id order, at most `limit`.
    fn scan(&self, region: &Region, limit: usize) -> Result<Vec<StoredRow>>;

    /// Number of committed rows.
    fn row_count(&self) -> usize;

    /// Event id the next committed row will receive.
    fn next_event_id(&self) -> u64;
}

/// Rows staged between `start_batch` and `finish_batch`.
#[derive(Debug, Default)]
pub struct Batch {
    rows: Vec<StoredRow>,
    failed: usize,
    first_error: Option<LogError>,
}

impl Batch {
    /// Stages one record. A record that cannot be encoded is counted as failed
    /// and the batch stays usable for the records after it.
    pub fn persist(&mut self, record: &ChangeRecord) -> Result<()> {
        match StoredRow::from_record(record) {
            Ok(row) => {
                self.rows.push(row);
                Ok(())
            }
            Err(e) => {
                self.failed += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    /// Records staged successfully so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.failed == 0
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

/// Result of committing a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows written durably
    pub committed: usize,
    /// Records that could not be persisted
    pub failed: usize,
    /// Event ids of the committed rows
    pub event_ids: Range<u64>,
    /// First persist error, if any record failed
    pub first_error: Option<String>,
}

impl BatchOutcome {
    /// A batch counts as failed when any of its records did not make it.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Change records on top of a row store.
pub struct ChangeStore {
    rows: Arc<dyn RowStore>,
    subjects: SubjectRegistry,
    sources: SourceRegistry,
}

impl std::fmt::Debug for ChangeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeStore")
            .field("rows", &self.rows.row_count())
            .field("subjects", &self.subjects)
            .field("sources", &self.sources)
            .finish()
    }
}

impl ChangeStore {
    pub fn new(rows: Arc<dyn RowStore>, subjects: SubjectRegistry, sources: SourceRegistry) -> Self {
        Self {
            rows,
            subjects,
            sources,
        }
    }

    /// File-backed store in `config.data_dir` with the built-in registries.
    pub fn open(config: &LogConfig) -> Result<Self> {
        let rows = FileRowStore::open(config)?;
        Ok(Self::new(
            Arc::new(rows),
            SubjectRegistry::with_builtin_kinds(),
            SourceRegistry::with_builtin_sources(),
        ))
    }

    /// Volatile store with the built-in registries.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRowStore::new()),
            SubjectRegistry::with_builtin_kinds(),
            SourceRegistry::with_builtin_sources(),
        )
    }

    pub fn row_store(&self) -> &Arc<dyn RowStore> {
        &self.rows
    }

    pub fn subjects(&self) -> &SubjectRegistry {
        &self.subjects
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn start_batch(&self) -> Batch {
        Batch::default()
    }

    /// Commits every staged row as one durable unit.
    ///
    /// Records that failed to persist are reported in the outcome; a storage
    /// error loses the whole batch and is returned.
    pub fn finish_batch(&self, batch: Batch) -> Result<BatchOutcome> {
        let committed = batch.rows.len();
        let event_ids = self.rows.append_rows(batch.rows)?;
        Ok(BatchOutcome {
            committed,
            failed: batch.failed,
            event_ids,
            first_error: batch.first_error.map(|e| e.to_string()),
        })
    }

    /// Runs the full batch protocol over `records`, in order.
    pub fn append_batch(&self, records: &[ChangeRecord]) -> Result<BatchOutcome> {
        let mut batch = self.start_batch();
        for record in records {
            // Failures are tallied in the batch; keep going.
            let _ = batch.persist(record);
        }
        self.finish_batch(batch)
    }

    /// Up to `limit` records in `world` whose coordinate lies inside `region`,
    /// in commit order. Rows that no longer decode are skipped with a warning.
    pub fn query(&self, world: &str, region: &Region, limit: usize) -> Result<Vec<ChangeRecord>> {
        if region.world() != world {
            tracing::debug!("Query for world {} with region in {}", world, region.world());
            return Ok(Vec::new());
        }
        let rows = self.rows.scan(region, limit)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping change {}: {}", row.event_id, e);
                }
            }
        }
        Ok(records)
    }

    /// Runs a [`ChangeQuery`], applying `default_limit` when it has none.
    pub fn query_changes(&self, query: &ChangeQuery, default_limit: usize) -> Result<Vec<ChangeRecord>> {
        self.query(query.world(), query.region(), query.limit_or(default_limit))
    }

    /// Rebuilds a record from its stored row.
    pub fn decode_row(&self, row: &StoredRow) -> Result<ChangeRecord> {
        let source = self
            .sources
            .resolve(&row.source)
            .ok_or_else(|| LogError::UnknownSource {
                name: row.source.clone(),
            })?;
        let subject = self.subjects.reconstruct(&row.kind, &row.from, &row.to)?;
        let reason: ChangeReason = row.reason.parse()?;
        Ok(ChangeRecord::new(
            row.world.clone(),
            row.pos(),
            row.timestamp,
            source,
            reason,
            subject,
        ))
    }
}
