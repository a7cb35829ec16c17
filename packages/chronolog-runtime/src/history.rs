//! One-stop handle over the store, logger, locks and restoration.

use std::sync::Arc;

use chronolog_core::change::ChangeQuery;
use chronolog_core::config::LogConfig;
use chronolog_core::{
    BlockPos, ChangeRecord, ChangeSet, ChangeSource, ChangeStore, Region, WorldAccess,
};

use crate::inspector::{format_change, InspectionSessions};
use crate::locks::RegionLockManager;
use crate::logger::ChangeLogger;
use crate::query::HistoryQuery;
use crate::restore::{RestorationCoordinator, RestorationHandle, RestorationReport};
use crate::Result;

/// Change history for one world store.
#[derive(Debug)]
pub struct History {
    config: LogConfig,
    store: Arc<ChangeStore>,
    logger: Arc<ChangeLogger>,
    locks: Arc<RegionLockManager>,
    coordinator: RestorationCoordinator,
    reader: HistoryQuery,
    sessions: InspectionSessions,
}

impl History {
    /// Opens the file-backed store in `config.data_dir` and starts the logger.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(config: LogConfig, world: Arc<dyn WorldAccess>) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(ChangeStore::open(&config)?);
        Ok(Self::with_store(config, store, world))
    }

    /// Wires the runtime around an existing store.
    pub fn with_store(config: LogConfig, store: Arc<ChangeStore>, world: Arc<dyn WorldAccess>) -> Self {
        let logger = ChangeLogger::spawn(store.clone(), &config);
        let locks = Arc::new(RegionLockManager::new());
        let coordinator = RestorationCoordinator::new(locks.clone(), logger.clone(), world);
        let reader = HistoryQuery::new(store.clone(), config.default_query_limit);
        let sessions = InspectionSessions::new(config.inspector_ttl());

        Self {
            config,
            store,
            logger,
            locks,
            coordinator,
            reader,
            sessions,
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ChangeStore> {
        &self.store
    }

    pub fn logger(&self) -> &Arc<ChangeLogger> {
        &self.logger
    }

    pub fn locks(&self) -> &Arc<RegionLockManager> {
        &self.locks
    }

    pub fn sessions(&self) -> &InspectionSessions {
        &self.sessions
    }

    /// Queues a change for persistence; `false` once shut down.
    pub fn record(&self, change: ChangeRecord) -> bool {
        self.logger.record(change)
    }

    pub async fn query(&self, query: ChangeQuery) -> Result<Vec<ChangeRecord>> {
        self.reader.query_changes(query).await
    }

    pub fn restore(&self, change_set: ChangeSet, source: ChangeSource) -> Result<RestorationHandle> {
        self.coordinator.restore(change_set, source)
    }

    pub fn restore_with<F>(&self, change_set: ChangeSet, source: ChangeSource, on_complete: F)
    where
        F: FnOnce(Result<RestorationReport>) + Send + 'static,
    {
        self.coordinator.restore_with(change_set, source, on_complete)
    }

    /// Puts every cell in `region` back to the state it had before the first
    /// change recorded at or after `since` (all history when `None`).
    pub async fn rollback_region(
        &self,
        region: Region,
        source: ChangeSource,
        since: Option<i64>,
    ) -> Result<RestorationHandle> {
        let change_set = self.plan_rollback(region, since).await?;
        self.restore(change_set, source)
    }

    /// Change set [`rollback_region`](Self::rollback_region) would restore.
    pub async fn plan_rollback(&self, region: Region, since: Option<i64>) -> Result<ChangeSet> {
        let records = self
            .reader
            .query(region.world(), &region, usize::MAX)
            .await?;
        let records = match since {
            Some(ts) => records.into_iter().filter(|r| r.timestamp() >= ts).collect(),
            None => records,
        };
        ChangeSet::earliest_per_cell(region, records)
    }

    /// History lines for one cell, or `None` when `owner` is not inspecting.
    pub async fn inspect(&self, owner: &str, world: &str, pos: BlockPos) -> Result<Option<Vec<String>>> {
        self.sessions.sweep();
        if !self.sessions.touch(owner) {
            return Ok(None);
        }
        let records = self.reader.query_changes(ChangeQuery::at(world, pos)).await?;
        Ok(Some(records.iter().map(format_change).collect()))
    }

    /// Flushes pending records and stops the logger.
    pub async fn shutdown(&self) -> Result<()> {
        self.logger.shutdown().await
    }
}
