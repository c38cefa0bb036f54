use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SyncSettings;
use crate::constants::SYNC_STATE_KEY;
use crate::date_range::DateRange;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventPatch, EventResponse, NewEvent};
use crate::remote::RemoteSource;
use crate::store::Store;
use crate::sync::cursor::{SyncCursor, SyncState};
use crate::sync::filter::SourceFilter;
use crate::sync::recurrence::expand_master;
use crate::sync::reconcile::Reconciler;
use crate::sync::report::SyncReport;
use crate::timeline::Timeline;

/// Keeps one store scope in step with one remote calendar.
///
/// A sync cycle fetches changes since the stored cursor, folds them into
/// the stored events and writes events and cursor back as one value.
/// Mutations go to the remote first and are then reconciled locally, so
/// the stored timeline reflects them before the next cycle.
pub struct SyncManager {
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn Store>,
    filter: SourceFilter,
    settings: SyncSettings,
    lock: Mutex<()>,
}

impl SyncManager {
    pub fn new(remote: Arc<dyn RemoteSource>, store: Arc<dyn Store>, settings: SyncSettings) -> Self {
        SyncManager {
            remote,
            store,
            filter: SourceFilter::default(),
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn calendar_id(&self) -> &str {
        self.remote.calendar_id()
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSource> {
        &self.remote
    }

    pub fn time_zone(&self) -> &Tz {
        &self.settings.time_zone
    }

    /// The synchronized window for a cycle running at `now`.
    pub fn window_at(&self, now: DateTime<Utc>) -> DateRange {
        DateRange::sync_window(
            now,
            &self.settings.time_zone,
            self.settings.sync_min_time.num_days(),
            self.settings.sync_max_time.num_days(),
        )
    }

    pub async fn run(&self) -> CalSyncResult<SyncReport> {
        self.run_at(Utc::now()).await
    }

    /// Run one sync cycle as of `now`.
    ///
    /// A stored cursor is only reused while the window is unchanged; otherwise
    /// the remote is asked for a complete listing.
    pub async fn run_at(&self, now: DateTime<Utc>) -> CalSyncResult<SyncReport> {
        let window = self.window_at(now);
        let cursor = self
            .load_state()
            .await?
            .cursor
            .filter(|c| c.is_valid_for(&window));

        debug!(
            calendar = %self.calendar_id(),
            delta = cursor.as_ref().is_some_and(|c| c.token.is_some()),
            "fetching changes"
        );
        let delta = self.remote.sync_events(&window, cursor.as_ref()).await?;
        let token = delta.token.clone();

        let _guard = self.lock.lock().await;
        let state = self.load_state().await?;
        let mut reconciler =
            Reconciler::new(state.events, window, self.settings.time_zone, &self.filter);
        reconciler.set_full(cursor.is_none());
        reconciler.apply_delta(delta);
        let (events, report) = reconciler.finish();

        self.save_state(&SyncState {
            cursor: Some(SyncCursor {
                token,
                window,
                synced_at: now,
            }),
            events,
        })
        .await?;

        info!(calendar = %self.calendar_id(), %report, "sync complete");
        Ok(report)
    }

    /// The stored events as a timeline. Empty until the first cycle completes.
    pub async fn async_get_timeline(&self) -> CalSyncResult<Timeline> {
        let state = self.load_state().await?;
        Ok(Timeline::new(state.events, self.settings.time_zone))
    }

    /// When the last cycle completed, if ever.
    pub async fn last_synced(&self) -> CalSyncResult<Option<DateTime<Utc>>> {
        Ok(self.load_state().await?.cursor.map(|c| c.synced_at))
    }

    /// Events in `range` straight from the remote. Nothing is stored.
    pub async fn async_list_events(&self, range: &DateRange) -> CalSyncResult<Vec<Event>> {
        let tz = self.settings.time_zone;
        let mut events = Vec::new();
        for event in self.remote.list_events(range).await? {
            if !self.filter.accepts(&event) {
                continue;
            }
            if let Err(e) = event.validate() {
                debug!(error = %e, "dropping invalid event from listing");
                continue;
            }
            if event.recurrence.is_some() {
                events.extend(expand_master(&event, range, &tz)?);
            } else {
                events.push(event);
            }
        }
        Ok(events)
    }

    pub async fn async_get_event(&self, id: &str) -> CalSyncResult<Event> {
        self.remote.get_event(id).await
    }

    pub async fn async_add_event(&self, event: &NewEvent) -> CalSyncResult<Event> {
        let created = self.remote.create_event(event).await?;
        self.reconcile_local(|r| r.upsert(created.clone())).await?;
        Ok(created)
    }

    pub async fn async_patch_event(&self, id: &str, patch: &EventPatch) -> CalSyncResult<Event> {
        let patched = self.remote.patch_event(id, patch).await?;
        self.reconcile_local(|r| r.upsert(patched.clone())).await?;
        Ok(patched)
    }

    pub async fn async_delete_event(&self, id: &str) -> CalSyncResult<()> {
        self.remote.delete_event(id).await?;
        self.reconcile_local(|r| r.delete(id)).await?;
        Ok(())
    }

    pub async fn async_respond_event(
        &self,
        id: &str,
        response: EventResponse,
        message: Option<&str>,
        send_response: bool,
    ) -> CalSyncResult<()> {
        self.remote
            .respond_event(id, response, message, send_response)
            .await
    }

    /// Fold a local change into the stored events, keeping the cursor.
    async fn reconcile_local<F>(&self, change: F) -> CalSyncResult<SyncReport>
    where
        F: FnOnce(&mut Reconciler<'_>),
    {
        let _guard = self.lock.lock().await;
        let state = self.load_state().await?;
        let window = match &state.cursor {
            Some(cursor) => cursor.window,
            None => self.window_at(Utc::now()),
        };

        let mut reconciler =
            Reconciler::new(state.events, window, self.settings.time_zone, &self.filter);
        change(&mut reconciler);
        let (events, report) = reconciler.finish();

        self.save_state(&SyncState {
            cursor: state.cursor,
            events,
        })
        .await?;
        debug!(calendar = %self.calendar_id(), %report, "local change reconciled");
        Ok(report)
    }

    async fn load_state(&self) -> CalSyncResult<SyncState> {
        match self.store.read(SYNC_STATE_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                CalSyncError::Store(format!(
                    "Corrupt sync state for '{}': {}",
                    self.calendar_id(),
                    e
                ))
            }),
            None => Ok(SyncState::default()),
        }
    }

    async fn save_state(&self, state: &SyncState) -> CalSyncResult<()> {
        let value = serde_json::to_value(state)?;
        self.store.write(SYNC_STATE_KEY, value).await
    }
}
