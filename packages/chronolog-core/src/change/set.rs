use std::collections::{HashMap, HashSet};

use crate::error::{LogError, Result};
use crate::region::{BlockPos, Region};
use crate::world::CellState;

use super::record::ChangeRecord;
use super::source::ChangeSource;

/// Ordered change records scoped to one region.
///
/// A set is *distinct* when no two records share a coordinate; only distinct
/// sets may be restored.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    region: Region,
    records: Vec<ChangeRecord>,
    distinct: bool,
}

impl ChangeSet {
    /// Wraps `records`, which must all lie inside `region`.
    pub fn new(region: Region, records: Vec<ChangeRecord>) -> Result<Self> {
        if let Some(outside) = records
            .iter()
            .find(|r| !region.contains(r.world(), r.pos()))
        {
            return Err(LogError::InvalidInput(format!(
                "change at {} {} lies outside {}",
                outside.world(),
                outside.pos(),
                region
            )));
        }
        let distinct = is_distinct(&records);
        Ok(Self {
            region,
            records,
            distinct,
        })
    }

    /// Collapses a history into a distinct set holding the oldest record per
    /// coordinate. Restoring it rewinds every cell to its state before the
    /// first recorded change.
    pub fn earliest_per_cell(region: Region, records: Vec<ChangeRecord>) -> Result<Self> {
        let mut chosen: HashMap<BlockPos, usize> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            chosen
                .entry(record.pos())
                .and_modify(|current| {
                    if record.timestamp() < records[*current].timestamp() {
                        *current = index;
                    }
                })
                .or_insert(index);
        }
        let keep: HashSet<usize> = chosen.into_values().collect();
        let collapsed = records
            .into_iter()
            .enumerate()
            .filter(|(index, _)| keep.contains(index))
            .map(|(_, record)| record)
            .collect();
        Self::new(region, collapsed)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn world(&self) -> &str {
        self.region.world()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose subject can be written back into the world.
    pub fn cell_records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(|r| r.subject().is_cell())
    }

    /// Subset of records at or after `timestamp`.
    pub fn since(&self, timestamp: i64) -> ChangeSet {
        let records: Vec<ChangeRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp() >= timestamp)
            .cloned()
            .collect();
        let distinct = is_distinct(&records);
        ChangeSet {
            region: self.region.clone(),
            records,
            distinct,
        }
    }

    /// Audit records for a restoration of this set: one `RESTORE` record per
    /// cell that was written, going from the live state it replaced
    /// (`overwritten`, as read just before the write) to the state written back.
    ///
    /// Cells absent from `overwritten` were not written and get no record.
    pub fn restoration_change_set(
        &self,
        source: &ChangeSource,
        timestamp: i64,
        overwritten: &[(BlockPos, CellState)],
    ) -> Vec<ChangeRecord> {
        let live: HashMap<BlockPos, &CellState> =
            overwritten.iter().map(|(pos, state)| (*pos, state)).collect();
        self.cell_records()
            .filter_map(|record| {
                let previous = live.get(&record.pos())?;
                record.restored_by(source, timestamp, (*previous).clone())
            })
            .collect()
    }
}

fn is_distinct(records: &[ChangeRecord]) -> bool {
    let mut seen = HashSet::with_capacity(records.len());
    records.iter().all(|r| seen.insert(r.pos()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeReason, Subject};

    fn region() -> Region {
        Region::new("overworld", BlockPos::new(0, 0, 0), BlockPos::new(1, 1, 1))
    }

    fn record(pos: BlockPos, timestamp: i64, from: &str, to: &str) -> ChangeRecord {
        ChangeRecord::new(
            "overworld",
            pos,
            timestamp,
            ChangeSource::actor("griefer").unwrap(),
            ChangeReason::Break,
            Subject::cell(from, to),
        )
    }

    #[test]
    fn test_distinct_detection() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(1, 1, 1);
        let set = ChangeSet::new(region(), vec![record(a, 1, "stone", "air"), record(b, 2, "dirt", "air")])
            .unwrap();
        assert!(set.is_distinct());

        let dup = ChangeSet::new(region(), vec![record(a, 1, "stone", "air"), record(a, 2, "air", "tnt")])
            .unwrap();
        assert!(!dup.is_distinct());
    }

    #[test]
    fn test_rejects_record_outside_region() {
        let err = ChangeSet::new(region(), vec![record(BlockPos::new(5, 0, 0), 1, "stone", "air")])
            .unwrap_err();
        assert!(matches!(err, LogError::InvalidInput(_)));
    }

    #[test]
    fn test_earliest_per_cell() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(1, 0, 0);
        let records = vec![
            record(a, 30, "air", "tnt"),
            record(b, 5, "glass", "air"),
            record(a, 10, "stone", "air"),
            record(a, 20, "air", "dirt"),
        ];
        let set = ChangeSet::earliest_per_cell(region(), records).unwrap();
        assert!(set.is_distinct());
        assert_eq!(set.len(), 2);
        let at_a = set.records().iter().find(|r| r.pos() == a).unwrap();
        assert_eq!(at_a.timestamp(), 10);
        assert_eq!(at_a.subject().serialize_from(), "stone");
    }

    #[test]
    fn test_restoration_change_set_skips_entities() {
        let entity = ChangeRecord::new(
            "overworld",
            BlockPos::new(1, 1, 0),
            3,
            ChangeSource::environment("explosion").unwrap(),
            ChangeReason::Death,
            Subject::entity("cow", ""),
        );
        let set = ChangeSet::new(
            region(),
            vec![record(BlockPos::new(0, 0, 0), 1, "stone", "air"), entity],
        )
        .unwrap();

        let admin = ChangeSource::actor("admin").unwrap();
        let overwritten = vec![
            (BlockPos::new(0, 0, 0), CellState::new("tnt")),
            (BlockPos::new(1, 1, 0), CellState::empty()),
        ];
        let restoration = set.restoration_change_set(&admin, 99, &overwritten);
        assert_eq!(restoration.len(), 1);
        assert_eq!(restoration[0].reason(), ChangeReason::Restore);
        assert_eq!(restoration[0].subject().serialize_from(), "tnt");
        assert_eq!(restoration[0].subject().serialize_to(), "stone");
    }

    #[test]
    fn test_restoration_change_set_only_written_cells() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(1, 0, 0);
        let set = ChangeSet::new(
            region(),
            vec![record(a, 1, "stone", "air"), record(b, 2, "dirt", "air")],
        )
        .unwrap();
        let admin = ChangeSource::actor("admin").unwrap();

        let restoration = set.restoration_change_set(&admin, 99, &[(b, CellState::new("sand"))]);
        assert_eq!(restoration.len(), 1);
        assert_eq!(restoration[0].pos(), b);
        assert_eq!(restoration[0].subject().serialize_from(), "sand");
        assert_eq!(restoration[0].subject().serialize_to(), "dirt");
    }

    #[test]
    fn test_since_recomputes_distinct() {
        let a = BlockPos::new(0, 0, 0);
        let set = ChangeSet::new(region(), vec![record(a, 1, "stone", "air"), record(a, 5, "air", "dirt")])
            .unwrap();
        assert!(!set.is_distinct());
        let recent = set.since(5);
        assert_eq!(recent.len(), 1);
        assert!(recent.is_distinct());
    }
}
