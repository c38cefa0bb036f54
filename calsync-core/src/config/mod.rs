//! Configuration types for calsync.

mod calendar;
mod global;

use crate::error::{CalSyncError, CalSyncResult};

pub use calendar::{CalendarConfig, EntityConfig};
pub use global::{CalSyncConfig, StoreKind, SyncSettings};

/// Fail unless `-limit <= value <= limit`.
pub(crate) fn check_bound(field: &str, value: i64, limit: i64) -> CalSyncResult<()> {
    if !(-limit..=limit).contains(&value) {
        return Err(CalSyncError::Config(format!(
            "{field} ({value}) must be between -{limit} and {limit}"
        )));
    }
    Ok(())
}
