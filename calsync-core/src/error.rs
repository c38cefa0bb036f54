//! Error types for calendar synchronization.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur in calsync operations.
#[derive(Error, Debug)]
pub enum CalSyncError {
    /// Transport, rate-limit or auth failure while talking to the remote calendar.
    #[error("Remote calendar unavailable: {0}")]
    RemoteUnavailable(String),

    /// A refresh cycle failed. Carries the cause so every waiter sees the same error.
    #[error("Error communicating with API: {0}")]
    UpdateFailed(#[source] Arc<CalSyncError>),

    #[error("Not authorised to modify events in '{calendar}': requires {permission}")]
    PermissionDenied { calendar: String, permission: String },

    #[error("Calendar '{0}' is not editable")]
    CalendarNotEditable(String),

    #[error("Cannot modify events in group calendar '{0}'")]
    GroupCalendar(String),

    #[error("Malformed event '{id}': {reason}")]
    MalformedEvent { id: String, reason: String },

    #[error("Unable to get events: Sync from server has not completed")]
    SyncNotReady,

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Invalid offset '{0}'")]
    InvalidOffset(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CalSyncError {
    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        CalSyncError::MalformedEvent {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the remote side (directly or via a failed refresh).
    pub fn is_remote_unavailable(&self) -> bool {
        match self {
            CalSyncError::RemoteUnavailable(_) => true,
            CalSyncError::UpdateFailed(cause) => cause.is_remote_unavailable(),
            _ => false,
        }
    }
}

/// Result type alias for calsync operations.
pub type CalSyncResult<T> = Result<T, CalSyncError>;
