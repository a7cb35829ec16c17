use std::ops::Range;

use crate::region::Region;

use super::index::SpatialIndex;
use super::row::StoredRow;

/// Committed rows plus their spatial index.
#[derive(Debug)]
pub(crate) struct RowTable {
    rows: Vec<StoredRow>,
    index: SpatialIndex,
    next_event_id: u64,
}

impl RowTable {
    pub(crate) fn new() -> Self {
        Self {
            rows: Vec::new(),
            index: SpatialIndex::new(),
            next_event_id: 1,
        }
    }

    pub(crate) fn next_event_id(&self) -> u64 {
        self.next_event_id
    }

    /// Stamps consecutive event ids onto `rows`, starting at the next free id.
    pub(crate) fn assign_ids(&self, rows: &mut [StoredRow]) -> Range<u64> {
        let start = self.next_event_id;
        for (offset, row) in rows.iter_mut().enumerate() {
            row.event_id = start + offset as u64;
        }
        start..start + rows.len() as u64
    }

    /// Adds rows whose ids were already assigned.
    pub(crate) fn commit(&mut self, rows: Vec<StoredRow>) {
        for row in rows {
            self.next_event_id = self.next_event_id.max(row.event_id + 1);
            let position = self.rows.len();
            self.index.insert(position, &row);
            self.rows.push(row);
        }
    }

    pub(crate) fn scan(&self, region: &Region, limit: usize) -> Vec<StoredRow> {
        self.index
            .lookup(&self.rows, region, limit)
            .into_iter()
            .map(|position| self.rows[position].clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}
