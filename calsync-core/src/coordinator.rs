//! Polling scheduler and read side of one synchronized calendar.
//!
//! A `SyncCoordinator` owns one `SyncManager`. Each refresh cycle runs the
//! manager and, on success, publishes a fresh immutable `Timeline`. Readers
//! clone the published `Arc<Timeline>`, so a cycle never changes a snapshot
//! somebody is holding. A failed cycle keeps the last good timeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Level, debug, warn};

use crate::auth::{AuthorizationChecker, PERM_CALENDARS_READWRITE};
use crate::config::SyncSettings;
use crate::date_range::DateRange;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventPatch, EventResponse, NewEvent};
use crate::resolver::resolve_current;
use crate::sync::{SyncManager, SyncReport};
use crate::throttle::RepeatedError;
use crate::timeline::Timeline;

/// Where the coordinator's data came from.
#[derive(Debug, Clone)]
pub enum SyncStatus {
    /// No cycle has succeeded yet.
    NeverSynced,
    /// The last cycle succeeded.
    Fresh { synced_at: DateTime<Utc> },
    /// The last cycle failed. Any published timeline is from `last_success`.
    Stale {
        last_success: Option<DateTime<Utc>>,
        error: Arc<CalSyncError>,
    },
}

impl SyncStatus {
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        match self {
            SyncStatus::NeverSynced => None,
            SyncStatus::Fresh { synced_at } => Some(*synced_at),
            SyncStatus::Stale { last_success, .. } => *last_success,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, SyncStatus::Stale { .. })
    }
}

struct Published {
    timeline: Option<Arc<Timeline>>,
    status: SyncStatus,
}

type Outcome = Result<SyncReport, Arc<CalSyncError>>;

pub struct SyncCoordinator {
    name: String,
    sync: Arc<SyncManager>,
    settings: SyncSettings,
    auth: Arc<dyn AuthorizationChecker>,
    clock: fn() -> DateTime<Utc>,
    published: RwLock<Published>,
    /// Held for the duration of a cycle. Keeps the outcome of the last one.
    refresh: Mutex<Option<Outcome>>,
    cycles: AtomicU64,
    updates: watch::Sender<u64>,
    errors: RepeatedError,
}

impl SyncCoordinator {
    pub fn new(
        name: impl Into<String>,
        sync: Arc<SyncManager>,
        settings: SyncSettings,
        auth: Arc<dyn AuthorizationChecker>,
    ) -> Self {
        let (updates, _) = watch::channel(0);
        SyncCoordinator {
            name: name.into(),
            sync,
            settings,
            auth,
            clock: Utc::now,
            published: RwLock::new(Published {
                timeline: None,
                status: SyncStatus::NeverSynced,
            }),
            refresh: Mutex::new(None),
            cycles: AtomicU64::new(0),
            updates,
            errors: RepeatedError::default(),
        }
    }

    /// Replace the wall clock used for windows and current-event framing.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calendar_id(&self) -> &str {
        self.sync.calendar_id()
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// The last published timeline, if any cycle has succeeded.
    pub fn timeline(&self) -> Option<Arc<Timeline>> {
        self.read_published(|p| p.timeline.clone())
    }

    pub fn status(&self) -> SyncStatus {
        self.read_published(|p| p.status.clone())
    }

    /// Receiver that changes after every completed cycle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Run one refresh cycle.
    ///
    /// Cycles never overlap. A caller arriving while one is in flight waits
    /// for it and receives its outcome instead of starting another.
    pub async fn async_refresh(&self) -> CalSyncResult<SyncReport> {
        let arrived = self.cycles.load(Ordering::SeqCst);
        let mut last = self.refresh.lock().await;
        if self.cycles.load(Ordering::SeqCst) != arrived {
            if let Some(outcome) = last.as_ref() {
                debug!(name = %self.name, "joined in-flight refresh");
                return outcome.clone().map_err(CalSyncError::UpdateFailed);
            }
        }

        let outcome = self.run_cycle().await;
        *last = Some(outcome.clone());
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.updates.send_replace(cycle);
        outcome.map_err(CalSyncError::UpdateFailed)
    }

    async fn run_cycle(&self) -> Outcome {
        debug!(name = %self.name, "started fetching data");
        let now = self.now();
        let result = match self.sync.run_at(now).await {
            Ok(report) => self.sync.async_get_timeline().await.map(|t| (report, t)),
            Err(e) => Err(e),
        };

        match result {
            Ok((report, timeline)) => {
                self.errors.clear();
                self.write_published(|p| {
                    p.timeline = Some(Arc::new(timeline));
                    p.status = SyncStatus::Fresh { synced_at: now };
                });
                Ok(report)
            }
            Err(e) => {
                let cause = Arc::new(e);
                if self.errors.record() == Level::WARN {
                    warn!(name = %self.name, error = %cause, "Error communicating with API");
                } else {
                    debug!(name = %self.name, error = %cause, "Repeat error communicating with API");
                }
                self.write_published(|p| {
                    p.status = SyncStatus::Stale {
                        last_success: p.status.last_success(),
                        error: Arc::clone(&cause),
                    };
                });
                Err(cause)
            }
        }
    }

    /// Events overlapping `[start, end)`.
    ///
    /// Ranges inside the synchronized window `[now + min, now + max]` are
    /// answered from the published timeline. Anything reaching outside it
    /// is fetched from the remote and not cached.
    pub async fn async_get_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalSyncResult<Vec<Event>> {
        let timeline = self.timeline().ok_or(CalSyncError::SyncNotReady)?;

        let now = self.now();
        let window = DateRange::new(now + self.settings.sync_min_time, now + self.settings.sync_max_time);
        if window.covers(start, end) {
            return Ok(timeline.overlapping(start, end).into_iter().cloned().collect());
        }

        debug!(name = %self.name, %start, %end, "range outside synchronized window, fetching directly");
        self.sync.async_list_events(&DateRange::new(start, end)).await
    }

    /// The event considered "now", if any.
    pub fn get_current_event(&self) -> Option<Event> {
        self.current_event_at(self.now())
    }

    pub fn current_event_at(&self, now: DateTime<Utc>) -> Option<Event> {
        let Some(timeline) = self.timeline() else {
            debug!(calendar = %self.calendar_id(), "no current event before first sync");
            return None;
        };
        let tz = *timeline.time_zone();
        let today = DateRange::local_day(now, &tz);
        resolve_current(timeline.overlapping(today.from, today.to), now, &tz).cloned()
    }

    pub async fn async_add_event(self: &Arc<Self>, event: &NewEvent) -> CalSyncResult<Event> {
        self.authorize()?;
        let created = self.sync.async_add_event(event).await?;
        self.after_mutation().await;
        Ok(created)
    }

    pub async fn async_patch_event(
        self: &Arc<Self>,
        id: &str,
        patch: &EventPatch,
    ) -> CalSyncResult<Event> {
        self.authorize()?;
        let patched = self.sync.async_patch_event(id, patch).await?;
        self.after_mutation().await;
        Ok(patched)
    }

    pub async fn async_delete_event(self: &Arc<Self>, id: &str) -> CalSyncResult<()> {
        self.authorize()?;
        self.sync.async_delete_event(id).await?;
        self.after_mutation().await;
        Ok(())
    }

    pub async fn async_respond_event(
        self: &Arc<Self>,
        id: &str,
        response: EventResponse,
        message: Option<&str>,
        send_response: bool,
    ) -> CalSyncResult<()> {
        self.authorize()?;
        self.sync
            .async_respond_event(id, response, message, send_response)
            .await?;
        self.after_mutation().await;
        Ok(())
    }

    /// Fails with `PermissionDenied` unless the account may write events.
    pub fn authorize(&self) -> CalSyncResult<()> {
        if self.auth.validate_authorization(PERM_CALENDARS_READWRITE) {
            Ok(())
        } else {
            Err(CalSyncError::PermissionDenied {
                calendar: self.name.clone(),
                permission: PERM_CALENDARS_READWRITE.to_string(),
            })
        }
    }

    /// Publish the locally reconciled store, then refresh in the background.
    async fn after_mutation(self: &Arc<Self>) {
        if self.timeline().is_some() {
            match self.sync.async_get_timeline().await {
                Ok(timeline) => self.write_published(|p| p.timeline = Some(Arc::new(timeline))),
                Err(e) => debug!(name = %self.name, error = %e, "could not republish timeline"),
            }
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // Failures are logged by the cycle itself
            let _ = this.async_refresh().await;
        });
    }

    /// Refresh now and then every `update_interval` until the handle is aborted.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.settings.update_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = this.async_refresh().await;
            }
        })
    }

    fn read_published<T>(&self, f: impl FnOnce(&Published) -> T) -> T {
        let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_published(&self, f: impl FnOnce(&mut Published)) {
        let mut guard = self.published.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
