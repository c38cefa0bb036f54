//! Incremental synchronization of one remote calendar into a store scope.

mod cursor;
mod filter;
mod manager;
mod reconcile;
mod recurrence;
mod report;

pub use cursor::{SyncCursor, SyncState};
pub use filter::SourceFilter;
pub use manager::SyncManager;
pub use reconcile::Reconciler;
pub use recurrence::{expand_master, occurrence_id};
pub use report::{DiffKind, SyncReport};
