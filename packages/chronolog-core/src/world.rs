//! Capability interface to the host world's cell storage.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::region::BlockPos;

/// State identifier returned for cells that were never written.
pub const EMPTY_CELL: &str = "air";

/// Opaque serialized state of a single cell, e.g. `stone` or `oak_log[axis=y]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellState(String);

impl CellState {
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    pub fn empty() -> Self {
        Self(EMPTY_CELL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty_cell(&self) -> bool {
        self.0 == EMPTY_CELL
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellState {
    fn from(state: &str) -> Self {
        Self::new(state)
    }
}

impl From<String> for CellState {
    fn from(state: String) -> Self {
        Self(state)
    }
}

/// Read/write access to live cell state, supplied by the embedding application.
///
/// Implementations must be callable from blocking worker threads.
pub trait WorldAccess: Send + Sync {
    /// Reads the current state of a cell.
    fn read_cell(&self, world: &str, pos: BlockPos) -> Result<CellState>;

    /// Overwrites a cell.
    fn write_cell(&self, world: &str, pos: BlockPos, state: &CellState) -> Result<()>;
}

/// In-memory world, used by tools and tests.
///
/// Unwritten cells read as [`EMPTY_CELL`]. Cells can be marked protected, in
/// which case writes to them fail with [`LogError::WorldAccess`].
#[derive(Debug, Default)]
pub struct MemoryWorld {
    cells: RwLock<HashMap<(String, BlockPos), CellState>>,
    protected: RwLock<HashSet<(String, BlockPos)>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cell directly, bypassing protection.
    pub fn set(&self, world: &str, pos: BlockPos, state: impl Into<CellState>) {
        self.cells
            .write()
            .insert((world.to_string(), pos), state.into());
    }

    /// Current state, or the empty cell.
    pub fn get(&self, world: &str, pos: BlockPos) -> CellState {
        self.cells
            .read()
            .get(&(world.to_string(), pos))
            .cloned()
            .unwrap_or_else(CellState::empty)
    }

    /// Rejects all future writes to a cell.
    pub fn protect(&self, world: &str, pos: BlockPos) {
        self.protected.write().insert((world.to_string(), pos));
    }

    pub fn unprotect(&self, world: &str, pos: BlockPos) {
        self.protected.write().remove(&(world.to_string(), pos));
    }

    /// Number of cells holding a non-empty state.
    pub fn populated(&self) -> usize {
        self.cells
            .read()
            .values()
            .filter(|state| !state.is_empty_cell())
            .count()
    }
}

impl WorldAccess for MemoryWorld {
    fn read_cell(&self, world: &str, pos: BlockPos) -> Result<CellState> {
        Ok(self.get(world, pos))
    }

    fn write_cell(&self, world: &str, pos: BlockPos, state: &CellState) -> Result<()> {
        let key = (world.to_string(), pos);
        if self.protected.read().contains(&key) {
            return Err(LogError::WorldAccess {
                world: world.to_string(),
                x: pos.x,
                y: pos.y,
                z: pos.z,
                message: "cell is protected".to_string(),
            });
        }
        self.cells.write().insert(key, state.clone());
        Ok(())
    }
}
