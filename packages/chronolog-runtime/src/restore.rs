//! Writing recorded prior states back into the world.
//!
//! A restoration validates its change set, locks the set's region, applies
//! the `from` state of every cell record on the blocking pool, logs one
//! `RESTORE` record per cell written and finally releases the region. The
//! region is released and the caller notified on every path, including
//! failures.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chronolog_core::change::now_millis;
use chronolog_core::{BlockPos, CellState, ChangeSet, ChangeSource, Region, WorldAccess};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::locks::RegionLockManager;
use crate::logger::ChangeLogger;
use crate::{LogError, Result};

/// Lifecycle of a single restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorationState {
    /// Region locked, nothing written yet
    Locked,
    /// Cell writes in progress
    Applying,
    /// Writes done, restoration records queued
    Committed,
    /// A write failed and the cells already written were put back
    Failed,
    /// Region released; the outcome has been delivered
    Released,
}

impl fmt::Display for RestorationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestorationState::Locked => "locked",
            RestorationState::Applying => "applying",
            RestorationState::Committed => "committed",
            RestorationState::Failed => "failed",
            RestorationState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful restoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationReport {
    pub region: Region,
    /// Cells written back
    pub applied: usize,
    /// Records without a cell subject
    pub skipped: usize,
    /// Restoration records handed to the logger
    pub logged: usize,
}

/// Resolves once a restoration has finished and its region is released.
#[derive(Debug)]
pub struct RestorationHandle {
    region: Region,
    state: Arc<Mutex<RestorationState>>,
    rx: oneshot::Receiver<Result<RestorationReport>>,
}

impl RestorationHandle {
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RestorationState {
        *self.state.lock()
    }
}

impl Future for RestorationHandle {
    type Output = Result<RestorationReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LogError::ChannelClosed)))
    }
}

/// Applies change sets to the world under region locks.
#[derive(Clone)]
pub struct RestorationCoordinator {
    locks: Arc<RegionLockManager>,
    logger: Arc<ChangeLogger>,
    world: Arc<dyn WorldAccess>,
}

impl fmt::Debug for RestorationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestorationCoordinator")
            .field("locks", &self.locks)
            .field("logger", &self.logger)
            .finish()
    }
}

impl RestorationCoordinator {
    pub fn new(
        locks: Arc<RegionLockManager>,
        logger: Arc<ChangeLogger>,
        world: Arc<dyn WorldAccess>,
    ) -> Self {
        Self {
            locks,
            logger,
            world,
        }
    }

    pub fn locks(&self) -> &Arc<RegionLockManager> {
        &self.locks
    }

    /// Starts restoring `change_set` on behalf of `source`.
    ///
    /// Fails immediately, without touching the lock set, when the set holds
    /// two records for the same cell, and fails with
    /// [`LogError::RegionLocked`] when its region overlaps one in use.
    /// Otherwise the work continues in the background and the returned
    /// handle resolves with the outcome. Must be called inside a Tokio runtime.
    pub fn restore(&self, change_set: ChangeSet, source: ChangeSource) -> Result<RestorationHandle> {
        if !change_set.is_distinct() {
            return Err(LogError::InvalidInput(format!(
                "change set for {} has more than one change per cell",
                change_set.region()
            )));
        }

        let region = change_set.region().clone();
        let guard = self
            .locks
            .lock(region.clone())
            .ok_or_else(|| LogError::RegionLocked {
                region: region.clone(),
            })?;

        let state = Arc::new(Mutex::new(RestorationState::Locked));
        let (tx, rx) = oneshot::channel();
        let world = self.world.clone();
        let logger = self.logger.clone();
        let task_state = state.clone();

        tokio::spawn(async move {
            let region = guard.region().clone();
            set_state(&task_state, &region, RestorationState::Applying);

            let apply_state = task_state.clone();
            let applied = tokio::task::spawn_blocking(move || {
                let result = apply_change_set(world.as_ref(), &change_set);
                if result.is_err() {
                    *apply_state.lock() = RestorationState::Failed;
                }
                (result, change_set)
            })
            .await;

            let result = match applied {
                Ok((Ok(applied), change_set)) => {
                    let records = change_set.restoration_change_set(
                        &source,
                        now_millis(),
                        &applied.overwritten,
                    );
                    let logged = logger.record_all(records);
                    set_state(&task_state, &region, RestorationState::Committed);
                    tracing::info!(
                        "Restored {} cells in {} for {} ({} skipped)",
                        applied.applied(),
                        region,
                        source,
                        applied.skipped
                    );
                    Ok(RestorationReport {
                        region: region.clone(),
                        applied: applied.applied(),
                        skipped: applied.skipped,
                        logged,
                    })
                }
                Ok((Err(e), _)) => {
                    tracing::error!("Failed to restore {}: {}", region, e);
                    Err(e)
                }
                Err(e) => {
                    tracing::error!("Restoration task for {} failed: {}", region, e);
                    Err(LogError::TaskFailed(format!("restoration task failed: {}", e)))
                }
            };

            drop(guard);
            set_state(&task_state, &region, RestorationState::Released);
            // The caller may have stopped waiting.
            let _ = tx.send(result);
        });

        Ok(RestorationHandle { region, state, rx })
    }

    /// Like [`restore`](Self::restore), but reports through `on_complete`.
    ///
    /// The callback runs exactly once, whether the restoration is rejected,
    /// fails or succeeds.
    pub fn restore_with<F>(&self, change_set: ChangeSet, source: ChangeSource, on_complete: F)
    where
        F: FnOnce(Result<RestorationReport>) + Send + 'static,
    {
        match self.restore(change_set, source) {
            Ok(handle) => {
                tokio::spawn(async move {
                    on_complete(handle.await);
                });
            }
            Err(e) => on_complete(Err(e)),
        }
    }
}

fn set_state(state: &Mutex<RestorationState>, region: &Region, next: RestorationState) {
    let mut current = state.lock();
    tracing::debug!("Restoration of {}: {} -> {}", region, *current, next);
    *current = next;
}

#[derive(Debug, Default)]
struct Applied {
    /// Cells written, each with the live state it replaced
    overwritten: Vec<(BlockPos, CellState)>,
    skipped: usize,
}

impl Applied {
    fn applied(&self) -> usize {
        self.overwritten.len()
    }
}

/// Writes each cell record's `from` state. On the first failing cell the
/// cells already written get their previous live state back.
fn apply_change_set(world: &dyn WorldAccess, change_set: &ChangeSet) -> Result<Applied> {
    let world_id = change_set.world();
    let mut written: Vec<(BlockPos, CellState)> = Vec::new();
    let mut skipped = 0;

    for record in change_set.records() {
        let Some(cell) = record.subject().as_cell() else {
            skipped += 1;
            continue;
        };
        let pos = record.pos();
        let step = world.read_cell(world_id, pos).and_then(|previous| {
            world.write_cell(world_id, pos, &cell.from)?;
            Ok(previous)
        });
        match step {
            Ok(previous) => written.push((pos, previous)),
            Err(e) => {
                roll_back(world, world_id, &written);
                return Err(e);
            }
        }
    }

    Ok(Applied {
        overwritten: written,
        skipped,
    })
}

fn roll_back(world: &dyn WorldAccess, world_id: &str, written: &[(BlockPos, CellState)]) {
    for (pos, previous) in written.iter().rev() {
        if let Err(e) = world.write_cell(world_id, *pos, previous) {
            tracing::warn!("Could not roll back cell {} in {}: {}", pos, world_id, e);
        }
    }
    if !written.is_empty() {
        tracing::warn!("Rolled back {} cells in {}", written.len(), world_id);
    }
}
