//! Defaults shared across the crate.

/// Seconds between scheduled refreshes.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// Days before now kept in the synchronized window (negative: in the past).
pub const DEFAULT_SYNC_EVENT_MIN_TIME_DAYS: i64 = -15;

/// Days after now kept in the synchronized window.
pub const DEFAULT_SYNC_EVENT_MAX_TIME_DAYS: i64 = 90;

/// Marker introducing an offset in an event subject, e.g. `Dentist !!-0:30`.
pub const DEFAULT_OFFSET: &str = "!!";

pub const DEFAULT_HOURS_BACKWARD_TO_GET: i64 = 0;
pub const DEFAULT_HOURS_FORWARD_TO_GET: i64 = 24;

/// Largest distance, in days, the synchronized window may reach from today.
pub const MAX_SYNC_WINDOW_DAYS: i64 = 3650;

/// Largest distance, in hours, the data attribute window may reach from now.
pub const MAX_HOURS_TO_GET: i64 = 24 * 3650;

/// Upper bound on occurrences generated from one series master per sync.
pub const MAX_EXPANDED_OCCURRENCES: u16 = 500;

/// Store key holding a scope's cursor and events.
pub const SYNC_STATE_KEY: &str = "sync";
