//! Core library for calsync.
//!
//! Keeps a local, queryable timeline of remote calendars:
//! - `sync` drives incremental synchronization of a remote into a store scope
//! - `coordinator` schedules refreshes, routes range queries and resolves the
//!   current event
//! - `entity` turns coordinator output into the external event representation
//! - `remote` defines the remote calendar capability and the provider transport

pub mod auth;
pub mod bus;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod date_range;
pub mod entity;
pub mod error;
pub mod event;
pub mod offset;
pub mod registry;
pub mod remote;
pub mod resolver;
pub mod setup;
pub mod store;
pub mod sync;
mod throttle;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{SyncCoordinator, SyncStatus};
pub use date_range::DateRange;
pub use entity::{CalendarEntity, CalendarEventView, CurrentEvent};
pub use error::{CalSyncError, CalSyncResult};
pub use event::{Event, EventPatch, EventResponse, EventTime, NewEvent, Sensitivity};
pub use timeline::Timeline;
