//! Asynchronous reads from the change store.

use std::sync::Arc;

use chronolog_core::{ChangeQuery, ChangeRecord, ChangeStore, Region};

use crate::{LogError, Result};

/// Runs store queries on the blocking pool so callers never wait on disk.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    store: Arc<ChangeStore>,
    default_limit: usize,
}

impl HistoryQuery {
    pub fn new(store: Arc<ChangeStore>, default_limit: usize) -> Self {
        Self {
            store,
            default_limit,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Records in `world` inside `region`, oldest first, at most `limit`.
    pub async fn query(&self, world: &str, region: &Region, limit: usize) -> Result<Vec<ChangeRecord>> {
        let store = self.store.clone();
        let world = world.to_string();
        let region = region.clone();
        tokio::task::spawn_blocking(move || store.query(&world, &region, limit))
            .await
            .map_err(|e| LogError::TaskFailed(format!("query task failed: {}", e)))?
    }

    /// Runs `query`, falling back to the default limit.
    pub async fn query_changes(&self, query: ChangeQuery) -> Result<Vec<ChangeRecord>> {
        let limit = query.limit_or(self.default_limit);
        self.query(query.world(), query.region(), limit).await
    }
}
