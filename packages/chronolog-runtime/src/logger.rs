//! Batching change logger.
//!
//! Producers call [`ChangeLogger::record`] from any thread; records land in a
//! pending buffer and a background task moves them to the change store in
//! batches, either on a fixed interval or as soon as the buffer reaches the
//! configured cap. Flushes never overlap, so batches commit in enqueue order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chronolog_core::config::LogConfig;
use chronolog_core::store::{BatchOutcome, ChangeStore};
use chronolog_core::ChangeRecord;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{LogError, Result};

#[derive(Debug, Default)]
struct Counters {
    batches_committed: AtomicU64,
    batches_failed: AtomicU64,
    records_persisted: AtomicU64,
    records_failed: AtomicU64,
    records_dropped: AtomicU64,
}

/// Point-in-time copy of the logger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Batches that reached the store
    pub batches_committed: u64,
    /// Batches lost to a storage error
    pub batches_failed: u64,
    /// Records durably written
    pub records_persisted: u64,
    /// Records that failed to persist, including those in lost batches
    pub records_failed: u64,
    /// Records offered after shutdown
    pub records_dropped: u64,
}

/// Pending records plus the shutdown flag, guarded together so no record
/// can slip in after shutdown has taken the final batch.
#[derive(Debug, Default)]
struct Buffer {
    records: Vec<ChangeRecord>,
    closed: bool,
}

struct Shared {
    store: Arc<ChangeStore>,
    pending: Mutex<Buffer>,
    batch_size_cap: usize,
    wake: Notify,
    stop: Notify,
    // Single writer: held for the whole of a flush.
    flush_lock: tokio::sync::Mutex<()>,
    stats: Counters,
}

/// Buffers change records and persists them in the background.
pub struct ChangeLogger {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeLogger {
    /// Starts the background flush task. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<ChangeStore>, config: &LogConfig) -> Arc<Self> {
        let shared = Arc::new(Shared {
            store,
            pending: Mutex::new(Buffer {
                records: Vec::with_capacity(config.batch_size_cap),
                closed: false,
            }),
            batch_size_cap: config.batch_size_cap.max(1),
            wake: Notify::new(),
            stop: Notify::new(),
            flush_lock: tokio::sync::Mutex::new(()),
            stats: Counters::default(),
        });

        let task = tokio::spawn(run_flush_loop(shared.clone(), config.flush_interval()));

        tracing::debug!(
            "Change logger started (interval {:?}, cap {})",
            config.flush_interval(),
            shared.batch_size_cap
        );

        Arc::new(Self {
            shared,
            task: Mutex::new(Some(task)),
        })
    }

    /// Enqueues a record. Never blocks on I/O.
    ///
    /// Returns `false` when the logger is shut down and the record was dropped.
    pub fn record(&self, change: ChangeRecord) -> bool {
        self.record_all(std::iter::once(change)) == 1
    }

    /// Enqueues several records, keeping their order, and returns how many
    /// were accepted: all of them, or none once the logger is shut down.
    pub fn record_all(&self, changes: impl IntoIterator<Item = ChangeRecord>) -> usize {
        let mut buffer = self.shared.pending.lock();
        if buffer.closed {
            drop(buffer);
            let dropped = changes.into_iter().count();
            if dropped > 0 {
                self.shared
                    .stats
                    .records_dropped
                    .fetch_add(dropped as u64, Ordering::Relaxed);
                tracing::warn!("Change logger is shut down, dropping {} changes", dropped);
            }
            return 0;
        }
        let before = buffer.records.len();
        buffer.records.extend(changes);
        let accepted = buffer.records.len() - before;
        let pending = buffer.records.len();
        drop(buffer);

        if pending >= self.shared.batch_size_cap {
            self.shared.wake.notify_one();
        }
        accepted
    }

    /// Records waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().records.len()
    }

    /// Flushes the pending buffer now and waits for the batch to commit.
    ///
    /// Returns `Ok(None)` when there was nothing to write.
    pub async fn flush(&self) -> Result<Option<BatchOutcome>> {
        self.shared.flush().await
    }

    pub fn stats(&self) -> LoggerStats {
        self.shared.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.pending.lock().closed
    }

    /// Stops the background task and writes whatever is still pending.
    ///
    /// Records offered after this call are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut buffer = self.shared.pending.lock();
            if buffer.closed {
                return Ok(());
            }
            buffer.closed = true;
        }
        self.shared.stop.notify_one();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Change logger task ended abnormally: {}", e);
            }
        }

        let result = self.shared.flush().await.map(|_| ());
        let stats = self.stats();
        tracing::info!(
            "Change logger stopped: {} batches committed, {} failed, {} records persisted, {} failed, {} dropped",
            stats.batches_committed,
            stats.batches_failed,
            stats.records_persisted,
            stats.records_failed,
            stats.records_dropped
        );
        result
    }
}

impl Drop for ChangeLogger {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ChangeLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeLogger")
            .field("pending", &self.pending())
            .field("batch_size_cap", &self.shared.batch_size_cap)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_flush_loop(shared: Arc<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shared.stop.notified() => break,
            _ = ticker.tick() => {}
            _ = shared.wake.notified() => {}
        }
        // Errors are logged inside; the loop keeps running.
        let _ = shared.flush().await;
    }
    tracing::debug!("Change logger flush loop exited");
}

impl Shared {
    async fn flush(&self) -> Result<Option<BatchOutcome>> {
        let _writer = self.flush_lock.lock().await;

        let records = std::mem::take(&mut self.pending.lock().records);
        if records.is_empty() {
            return Ok(None);
        }
        let count = records.len() as u64;
        let store = self.store.clone();

        let result = tokio::task::spawn_blocking(move || store.append_batch(&records))
            .await
            .map_err(|e| LogError::TaskFailed(format!("flush task failed: {}", e)))
            .and_then(|r| r);

        match result {
            Ok(outcome) => {
                self.stats.batches_committed.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .records_persisted
                    .fetch_add(outcome.committed as u64, Ordering::Relaxed);
                if outcome.is_complete() {
                    tracing::debug!(
                        "Persisted batch of {} changes (events {:?})",
                        outcome.committed,
                        outcome.event_ids
                    );
                } else {
                    self.stats
                        .records_failed
                        .fetch_add(outcome.failed as u64, Ordering::Relaxed);
                    tracing::error!(
                        "Batch persisted with {} of {} changes failing: {}",
                        outcome.failed,
                        count,
                        outcome.first_error.as_deref().unwrap_or("unknown error")
                    );
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
                self.stats.records_failed.fetch_add(count, Ordering::Relaxed);
                tracing::error!("Failed to persist batch of {} changes: {}", count, e);
                Err(e)
            }
        }
    }
}

impl Counters {
    fn snapshot(&self) -> LoggerStats {
        LoggerStats {
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronolog_core::{BlockPos, ChangeReason, ChangeSource, Region, Subject};

    fn change(x: i32) -> ChangeRecord {
        ChangeRecord::new(
            "overworld",
            BlockPos::new(x, 64, 0),
            1_000 + x as i64,
            ChangeSource::actor("steve").unwrap(),
            ChangeReason::Break,
            Subject::cell("stone", "air"),
        )
    }

    fn slow_config(cap: usize) -> LogConfig {
        LogConfig {
            flush_interval_ms: 60_000,
            batch_size_cap: cap,
            ..Default::default()
        }
    }

    fn everything() -> Region {
        Region::new(
            "overworld",
            BlockPos::new(-100, 0, -100),
            BlockPos::new(100, 255, 100),
        )
    }

    #[tokio::test]
    async fn test_flush_writes_in_enqueue_order() {
        let store = Arc::new(ChangeStore::in_memory());
        let logger = ChangeLogger::spawn(store.clone(), &slow_config(1_000));

        for x in 0..5 {
            logger.record(change(x));
        }
        assert_eq!(logger.pending(), 5);

        let outcome = logger.flush().await.unwrap().unwrap();
        assert_eq!(outcome.committed, 5);
        assert_eq!(logger.pending(), 0);

        let found = store.query("overworld", &everything(), 10).unwrap();
        let xs: Vec<i32> = found.iter().map(|r| r.pos().x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4]);

        logger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let store = Arc::new(ChangeStore::in_memory());
        let logger = ChangeLogger::spawn(store.clone(), &slow_config(10));
        assert!(logger.flush().await.unwrap().is_none());
        assert_eq!(logger.stats(), LoggerStats::default());
        logger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_closes() {
        let store = Arc::new(ChangeStore::in_memory());
        let logger = ChangeLogger::spawn(store.clone(), &slow_config(1_000));
        assert_eq!(logger.record_all((0..3).map(change)), 3);

        logger.shutdown().await.unwrap();
        assert!(logger.is_closed());
        assert_eq!(store.row_store().row_count(), 3);

        assert!(!logger.record(change(9)));
        assert_eq!(logger.record_all((10..12).map(change)), 0);
        assert_eq!(logger.pending(), 0);
        assert_eq!(logger.stats().records_dropped, 3);
        assert_eq!(logger.stats().records_persisted, 3);

        // Second shutdown is harmless.
        logger.shutdown().await.unwrap();
    }
}
