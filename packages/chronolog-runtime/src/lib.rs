//! Asynchronous side of the change log.
//!
//! The [`ChangeLogger`] buffers records and flushes them to the change store
//! on a background task, the [`RegionLockManager`] keeps restorations from
//! touching overlapping volumes, and the [`RestorationCoordinator`] writes
//! recorded prior states back into the live world.

mod history;
mod inspector;
mod locks;
mod logger;
mod query;
mod restore;

pub use chronolog_core::error::{LogError, Result};

pub use history::History;
pub use inspector::{format_change, InspectionSessions};
pub use locks::{RegionLockGuard, RegionLockManager};
pub use logger::{ChangeLogger, LoggerStats};
pub use query::HistoryQuery;
pub use restore::{
    RestorationCoordinator, RestorationHandle, RestorationReport, RestorationState,
};
