//! Fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::date_range::DateRange;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventPatch, EventResponse, EventTime, NewEvent, Sensitivity};
use crate::remote::{CalendarInfo, CalendarKind, EventDelta, RemoteSource};
use crate::sync::SyncCursor;

/// Thursday 2025-05-01 00:00 UTC.
pub fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
}

/// `minutes` after [`base`].
pub fn at(minutes: i64) -> DateTime<Utc> {
    base() + Duration::minutes(minutes)
}

pub fn timed_event(id: &str, subject: &str, start_min: i64, end_min: i64) -> Event {
    Event {
        id: id.to_string(),
        subject: subject.to_string(),
        body: None,
        location: None,
        start: EventTime::DateTime(at(start_min)),
        end: EventTime::DateTime(at(end_min)),
        series_id: None,
        recurrence: None,
        sensitivity: Sensitivity::Normal,
        updated: None,
    }
}

/// All-day event covering `days` dates from `year-month-day`.
pub fn all_day_event(id: &str, subject: &str, year: i32, month: u32, day: u32, days: i64) -> Event {
    let start = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    Event {
        start: EventTime::Date(start),
        end: EventTime::Date(start + Duration::days(days)),
        ..timed_event(id, subject, 0, 0)
    }
}

pub fn calendar_info(id: &str) -> CalendarInfo {
    CalendarInfo {
        id: id.to_string(),
        name: "Calendar".to_string(),
        can_edit: true,
        kind: CalendarKind::Personal,
        supports_delta: true,
        color: None,
    }
}

/// Scripted remote that counts every call.
///
/// `sync_events` pops queued deltas first and falls back to a snapshot of
/// the events it holds.
pub struct FakeRemote {
    info: CalendarInfo,
    events: Mutex<Vec<Event>>,
    deltas: Mutex<VecDeque<EventDelta>>,
    tokens: Mutex<Vec<Option<String>>>,
    failing: AtomicBool,
    latency: Mutex<Option<std::time::Duration>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub patch_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub respond_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new(events: Vec<Event>) -> Self {
        Self::with_info(calendar_info("cal-1"), events)
    }

    pub fn with_info(info: CalendarInfo, events: Vec<Event>) -> Self {
        FakeRemote {
            info,
            events: Mutex::new(events),
            deltas: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            latency: Mutex::new(None),
            next_id: AtomicUsize::new(1),
            list_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            patch_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            respond_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn push_delta(&self, delta: EventDelta) {
        self.deltas.lock().unwrap().push_back(delta);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every `sync_events` call by `latency`.
    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Tokens passed to each `sync_events` call, in order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        [
            &self.list_calls,
            &self.sync_calls,
            &self.create_calls,
            &self.patch_calls,
            &self.delete_calls,
            &self.respond_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn check(&self) -> CalSyncResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CalSyncError::RemoteUnavailable("HTTP 503".into()));
        }
        Ok(())
    }

    fn in_range(&self, range: &DateRange) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| range.overlaps(e.start_utc(&Tz::UTC), e.end_utc(&Tz::UTC)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    fn info(&self) -> &CalendarInfo {
        &self.info
    }

    async fn list_events(&self, range: &DateRange) -> CalSyncResult<Vec<Event>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.in_range(range))
    }

    async fn sync_events(
        &self,
        window: &DateRange,
        cursor: Option<&SyncCursor>,
    ) -> CalSyncResult<EventDelta> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.check()?;
        self.tokens
            .lock()
            .unwrap()
            .push(cursor.and_then(|c| c.token.clone()));
        if let Some(delta) = self.deltas.lock().unwrap().pop_front() {
            return Ok(delta);
        }
        Ok(EventDelta::snapshot(self.in_range(window)))
    }

    async fn get_event(&self, id: &str) -> CalSyncResult<Event> {
        self.check()?;
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| CalSyncError::EventNotFound(id.to_string()))
    }

    async fn create_event(&self, event: &NewEvent) -> CalSyncResult<Event> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = Event::from_new(&id, event);
        self.events.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn patch_event(&self, id: &str, patch: &EventPatch) -> CalSyncResult<Event> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalSyncError::EventNotFound(id.to_string()))?;
        event.apply_patch(patch);
        event.updated = Some(event.updated.unwrap_or_else(base) + Duration::seconds(1));
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> CalSyncResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id && e.series_id.as_deref() != Some(id));
        if events.len() == before {
            return Err(CalSyncError::EventNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn respond_event(
        &self,
        _id: &str,
        _response: EventResponse,
        _message: Option<&str>,
        _send_response: bool,
    ) -> CalSyncResult<()> {
        self.respond_calls.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}
