//! Chunk-bucketed spatial index over row positions.

use std::collections::HashMap;

use crate::region::{ChunkKey, Region};

use super::row::StoredRow;

/// Maps world and chunk column to the positions of rows inside it.
///
/// Positions are pushed in commit order, so every bucket stays sorted.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    worlds: HashMap<String, HashMap<ChunkKey, Vec<usize>>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the row stored at `position`.
    pub fn insert(&mut self, position: usize, row: &StoredRow) {
        self.worlds
            .entry(row.world.clone())
            .or_default()
            .entry(row.pos().chunk())
            .or_default()
            .push(position);
    }

    /// Positions of rows inside `region` in ascending order, at most `limit`.
    pub fn lookup(&self, rows: &[StoredRow], region: &Region, limit: usize) -> Vec<usize> {
        if limit == 0 {
            return Vec::new();
        }
        let Some(chunks) = self.worlds.get(region.world()) else {
            return Vec::new();
        };

        // Walk whichever is smaller: the region's chunks or the world's populated ones.
        let mut candidates: Vec<usize> = if region.chunk_count() <= chunks.len() as u64 {
            region
                .chunks()
                .filter_map(|key| chunks.get(&key))
                .flatten()
                .copied()
                .collect()
        } else {
            chunks
                .iter()
                .filter(|(key, _)| chunk_overlaps(key, region))
                .flat_map(|(_, positions)| positions.iter().copied())
                .collect()
        };
        candidates.sort_unstable();

        candidates
            .into_iter()
            .filter(|&position| region.contains_pos(rows[position].pos()))
            .take(limit)
            .collect()
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }
}

fn chunk_overlaps(key: &ChunkKey, region: &Region) -> bool {
    let (lo, hi) = (region.min().chunk(), region.max().chunk());
    (lo.x..=hi.x).contains(&key.x) && (lo.z..=hi.z).contains(&key.z)
}
