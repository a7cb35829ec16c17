//! Mutual exclusion over regions.
//!
//! At any time the held regions are pairwise non-intersecting. Acquisition
//! never waits: a request that overlaps a held region fails immediately.

use std::sync::Arc;

use chronolog_core::Region;
use parking_lot::Mutex;

/// Set of currently held regions.
#[derive(Debug, Default)]
pub struct RegionLockManager {
    held: Mutex<Vec<Region>>,
}

impl RegionLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes `region` if it intersects nothing currently held.
    pub fn try_acquire(&self, region: &Region) -> bool {
        let mut held = self.held.lock();
        if held.iter().any(|h| h.intersects(region)) {
            return false;
        }
        held.push(region.clone());
        tracing::trace!("Locked region {}", region);
        true
    }

    /// Releases `region`. Releasing a region that is not held does nothing.
    pub fn release(&self, region: &Region) {
        let mut held = self.held.lock();
        if let Some(index) = held.iter().position(|h| h == region) {
            held.swap_remove(index);
            tracing::trace!("Released region {}", region);
        }
    }

    /// Returns `true` if any held region intersects `region`.
    pub fn is_locked(&self, region: &Region) -> bool {
        self.held.lock().iter().any(|h| h.intersects(region))
    }

    /// Snapshot of the held regions.
    pub fn held(&self) -> Vec<Region> {
        self.held.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.lock().is_empty()
    }

    /// Scoped variant of [`try_acquire`](Self::try_acquire): the region is
    /// released when the guard drops.
    pub fn lock(self: &Arc<Self>, region: Region) -> Option<RegionLockGuard> {
        if self.try_acquire(&region) {
            Some(RegionLockGuard {
                manager: self.clone(),
                region,
            })
        } else {
            None
        }
    }
}

/// Holds a region until dropped.
#[derive(Debug)]
pub struct RegionLockGuard {
    manager: Arc<RegionLockManager>,
    region: Region,
}

impl RegionLockGuard {
    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl Drop for RegionLockGuard {
    fn drop(&mut self) {
        self.manager.release(&self.region);
    }
}
