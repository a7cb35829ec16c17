use std::ops::Range;

use parking_lot::RwLock;

use crate::error::Result;
use crate::region::Region;

use super::row::StoredRow;
use super::table::RowTable;
use super::RowStore;

/// Volatile row store for tests and embedders that bring their own durability.
#[derive(Debug)]
pub struct MemoryRowStore {
    table: RwLock<RowTable>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RowTable::new()),
        }
    }
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore for MemoryRowStore {
    fn append_rows(&self, mut rows: Vec<StoredRow>) -> Result<Range<u64>> {
        let mut table = self.table.write();
        let ids = table.assign_ids(&mut rows);
        table.commit(rows);
        Ok(ids)
    }

    fn scan(&self, region: &Region, limit: usize) -> Result<Vec<StoredRow>> {
        Ok(self.table.read().scan(region, limit))
    }

    fn row_count(&self) -> usize {
        self.table.read().len()
    }

    fn next_event_id(&self) -> u64 {
        self.table.read().next_event_id()
    }
}
