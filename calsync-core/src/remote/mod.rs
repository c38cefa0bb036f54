//! The remote calendar capability consumed by the sync manager.
//!
//! `RemoteSource` is what a calendar backend has to offer: listing, delta
//! sync and the mutation calls. `ProviderRemote` implements it by talking to
//! an external provider binary; tests use scripted fakes.

pub mod protocol;
pub mod provider;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CalendarConfig;
use crate::date_range::DateRange;
use crate::error::CalSyncResult;
use crate::event::{Event, EventPatch, EventResponse, NewEvent};
use crate::sync::SyncCursor;

pub use provider::{ProviderFactory, ProviderRemote};

/// Whose calendar this is. Group calendars do not accept modifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    #[default]
    Personal,
    Shared,
    Group,
}

/// Calendar metadata reported by the remote when a calendar is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub can_edit: bool,
    #[serde(default)]
    pub kind: CalendarKind,
    /// Whether the remote understands delta cursors.
    #[serde(default)]
    pub supports_delta: bool,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One change reported by a delta sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventChange {
    /// New or modified event (or series master).
    Upsert { event: Event },
    Delete { id: String },
    /// A "this and following" edit or delete of a recurring series: every
    /// occurrence of `series_id` starting at or after `from` is replaced by
    /// `replacement` (empty for a delete).
    SeriesRange {
        series_id: String,
        from: DateTime<Utc>,
        #[serde(default)]
        replacement: Vec<Event>,
    },
}

/// Result of a delta sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDelta {
    pub changes: Vec<EventChange>,
    /// Opaque token to pass back on the next sync.
    #[serde(default)]
    pub token: Option<String>,
    /// The changes list every event in the window; anything unmentioned is gone.
    #[serde(default)]
    pub full: bool,
}

impl EventDelta {
    /// A complete listing of the window.
    pub fn snapshot(events: Vec<Event>) -> Self {
        EventDelta {
            changes: events
                .into_iter()
                .map(|event| EventChange::Upsert { event })
                .collect(),
            token: None,
            full: true,
        }
    }
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    fn info(&self) -> &CalendarInfo;

    fn calendar_id(&self) -> &str {
        &self.info().id
    }

    fn kind(&self) -> CalendarKind {
        self.info().kind
    }

    /// Events in `range`, straight from the remote.
    async fn list_events(&self, range: &DateRange) -> CalSyncResult<Vec<Event>>;

    /// Changes since `cursor` within `window`.
    ///
    /// Sources without delta support return a full snapshot.
    async fn sync_events(
        &self,
        window: &DateRange,
        _cursor: Option<&SyncCursor>,
    ) -> CalSyncResult<EventDelta> {
        let events = self.list_events(window).await?;
        Ok(EventDelta::snapshot(events))
    }

    async fn get_event(&self, id: &str) -> CalSyncResult<Event>;

    async fn create_event(&self, event: &NewEvent) -> CalSyncResult<Event>;

    async fn patch_event(&self, id: &str, patch: &EventPatch) -> CalSyncResult<Event>;

    async fn delete_event(&self, id: &str) -> CalSyncResult<()>;

    async fn respond_event(
        &self,
        id: &str,
        response: EventResponse,
        message: Option<&str>,
        send_response: bool,
    ) -> CalSyncResult<()>;
}

/// Opens remote sources for configured calendars.
#[async_trait]
pub trait RemoteFactory: Send + Sync {
    async fn open(&self, calendar: &CalendarConfig) -> CalSyncResult<Arc<dyn RemoteSource>>;
}
