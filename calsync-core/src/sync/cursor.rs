//! Delta state persisted alongside the events of a scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;
use crate::event::Event;

/// How far synchronization has progressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Opaque delta token from the remote, when it supports one.
    pub token: Option<String>,
    /// Window the token was issued for. A token is only reused for the same window.
    pub window: DateRange,
    pub synced_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn is_valid_for(&self, window: &DateRange) -> bool {
        self.window == *window
    }
}

/// Everything stored for one scope. Written as a single value so the cursor
/// and the events it describes never diverge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub cursor: Option<SyncCursor>,
    #[serde(default)]
    pub events: Vec<Event>,
}
