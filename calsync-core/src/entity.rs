//! Presentation layer on top of a coordinator.
//!
//! A `CalendarEntity` is what an outside consumer talks to: event lists go
//! through exclusion, ordering and conversion to [`CalendarEventView`], the
//! current event is decorated with its subject offset, and mutations are
//! checked against the entity's editability before reaching the remote.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Level, debug, warn};

use crate::bus::{BusEvent, BusEventKind, EventBus};
use crate::config::EntityConfig;
use crate::constants::DEFAULT_OFFSET;
use crate::coordinator::SyncCoordinator;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventPatch, EventResponse, EventTime, NewEvent};
use crate::offset::{extract_offset, is_offset_reached};
use crate::throttle::RepeatedError;

const BODY_WRAP_WIDTH: usize = 1000;

/// External representation of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventView {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub all_day: bool,
    /// Series the event belongs to, when it is an occurrence.
    pub recurrence_id: Option<String>,
}

/// The resolved current event with its offset marker removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentEvent {
    pub view: CalendarEventView,
    pub offset_reached: bool,
}

/// Drop events whose subject matches any of `patterns` (searched, not anchored).
pub fn filter_events(events: Vec<Event>, patterns: &[Regex]) -> Vec<Event> {
    if patterns.is_empty() {
        return events;
    }
    events
        .into_iter()
        .filter(|e| !patterns.iter().any(|p| p.is_match(&e.subject)))
        .collect()
}

/// Order by normalized start; all-day events count from local midnight in `tz`.
pub fn sort_events(mut events: Vec<Event>, tz: &Tz) -> Vec<Event> {
    events.sort_by_key(|e| e.sort_key(tz));
    events
}

/// Convert one event. Fails with `MalformedEvent` when it cannot be shown.
pub fn to_view(event: &Event) -> CalSyncResult<CalendarEventView> {
    event.validate()?;
    let description = match &event.body {
        Some(body) if !body.trim().is_empty() => Some(clean_html(&event.id, body)?),
        _ => None,
    };
    Ok(CalendarEventView {
        uid: event.id.clone(),
        summary: event.subject.clone(),
        description,
        location: event.location.clone().filter(|l| !l.is_empty()),
        start: event.start,
        end: event.end,
        all_day: event.is_all_day(),
        recurrence_id: event.series_id.clone(),
    })
}

fn clean_html(id: &str, body: &str) -> CalSyncResult<String> {
    let text = html2text::from_read(body.as_bytes(), BODY_WRAP_WIDTH)
        .map_err(|e| CalSyncError::malformed(id, format!("unreadable body: {e}")))?;
    Ok(text.trim().to_string())
}

pub struct CalendarEntity {
    coordinator: Arc<SyncCoordinator>,
    config: EntityConfig,
    entity_id: String,
    exclude: Vec<Regex>,
    update_supported: bool,
    group_calendar: bool,
    bus: Arc<dyn EventBus>,
    state: Mutex<EntityState>,
    /// Ids of events already reported as unconvertible.
    reported_malformed: Mutex<HashSet<String>>,
    conversion_errors: RepeatedError,
}

#[derive(Debug, Default)]
struct EntityState {
    current: Option<CurrentEvent>,
    data: Vec<CalendarEventView>,
}

impl CalendarEntity {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        config: EntityConfig,
        update_supported: bool,
        group_calendar: bool,
        bus: Arc<dyn EventBus>,
    ) -> CalSyncResult<Self> {
        config.validate()?;
        let exclude = config.exclude_patterns()?;
        Ok(CalendarEntity {
            entity_id: format!("calendar.{}", config.device_id),
            coordinator,
            config,
            exclude,
            update_supported,
            group_calendar,
            bus,
            state: Mutex::new(EntityState::default()),
            reported_malformed: Mutex::new(HashSet::new()),
            conversion_errors: RepeatedError::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.coordinator.calendar_id(), self.config.device_id)
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn update_supported(&self) -> bool {
        self.update_supported
    }

    /// Events in `[start, end)` in display form.
    pub async fn async_get_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalSyncResult<Vec<CalendarEventView>> {
        debug!(name = %self.name(), "start get_events");
        let events = self.coordinator.async_get_events(start, end).await?;
        let views = self.process(events);
        debug!(name = %self.name(), count = views.len(), "end get_events");
        Ok(views)
    }

    /// Exclude, sort and convert. Each unconvertible event is warned about
    /// once; the record is forgotten after a batch that converts cleanly.
    fn process(&self, events: Vec<Event>) -> Vec<CalendarEventView> {
        let tz = self.coordinator.settings().time_zone;
        let events = sort_events(filter_events(events, &self.exclude), &tz);
        let mut reported = self
            .reported_malformed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut clean = true;

        let views = events
            .iter()
            .filter_map(|event| match to_view(event) {
                Ok(view) => Some(view),
                Err(e) => {
                    clean = false;
                    if reported.insert(event.id.clone()) {
                        warn!(error = %e, subject = %event.subject, "Invalid event found");
                    } else {
                        debug!(error = %e, subject = %event.subject, "Repeat invalid event");
                    }
                    None
                }
            })
            .collect();

        if clean {
            reported.clear();
        }
        views
    }

    /// Refresh, then rebuild the data attribute and the current event.
    ///
    /// A failed refresh still rebuilds from the last good timeline and is
    /// then returned as `UpdateFailed`.
    pub async fn async_update(&self) -> CalSyncResult<()> {
        debug!(name = %self.name(), "start update");
        let refreshed = self.coordinator.async_refresh().await;
        self.update_from_timeline();
        debug!(name = %self.name(), "end update");
        refreshed.map(|_| ())
    }

    /// Rebuild the data attribute and the current event from the published
    /// timeline without refreshing. Used after a polling cycle.
    pub fn update_from_timeline(&self) {
        let now = self.coordinator.now();
        let data = self.build_data(now);
        let current = self.resolve_current(now);
        self.with_state(|state| {
            state.data = data;
            state.current = current;
        });
    }

    fn build_data(&self, now: DateTime<Utc>) -> Vec<CalendarEventView> {
        let Some(timeline) = self.coordinator.timeline() else {
            return Vec::new();
        };
        let range_start = now + Duration::hours(self.config.hours_backward_to_get);
        let range_end = now + Duration::hours(self.config.hours_forward_to_get);
        let events = timeline
            .overlapping(range_start, range_end)
            .into_iter()
            .cloned()
            .collect();

        let mut views = self.process(events);
        if let Some(max) = self.config.max_results {
            views.truncate(max);
        }
        views
    }

    fn resolve_current(&self, now: DateTime<Utc>) -> Option<CurrentEvent> {
        let Some(event) = self.coordinator.current_event_at(now) else {
            debug!(entity = %self.entity_id, "no matching event found");
            return None;
        };

        let mut view = match to_view(&event) {
            Ok(view) => {
                self.conversion_errors.clear();
                view
            }
            Err(e) => {
                if self.conversion_errors.record() == Level::WARN {
                    warn!(error = %e, subject = %event.subject, "Invalid event found");
                } else {
                    debug!(error = %e, subject = %event.subject, "Repeat invalid event");
                }
                return None;
            }
        };

        let (summary, offset) = match extract_offset(&view.summary, DEFAULT_OFFSET) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "ignoring unparsable offset");
                (view.summary.clone(), Duration::zero())
            }
        };
        view.summary = summary;
        let tz = self.coordinator.settings().time_zone;
        let offset_reached = is_offset_reached(event.start_utc(&tz), offset, now);

        Some(CurrentEvent {
            view,
            offset_reached,
        })
    }

    pub fn current_event(&self) -> Option<CurrentEvent> {
        self.with_state(|state| state.current.clone())
    }

    pub fn offset_reached(&self) -> bool {
        self.with_state(|state| state.current.as_ref().is_some_and(|c| c.offset_reached))
    }

    /// Upcoming events built by the last update.
    pub fn data(&self) -> Vec<CalendarEventView> {
        self.with_state(|state| state.data.clone())
    }

    /// Extra attributes published alongside the entity state.
    pub fn attributes(&self) -> serde_json::Value {
        let color = self.coordinator.sync().remote().info().color.clone();
        self.with_state(|state| {
            let mut attrs = json!({ "data": state.data });
            if let Some(color) = color {
                attrs["color"] = json!(color);
            }
            if let Some(current) = &state.current {
                attrs["all_day"] = json!(current.view.all_day);
                attrs["offset_reached"] = json!(current.offset_reached);
            }
            attrs
        })
    }

    pub async fn async_create_calendar_event(&self, event: &NewEvent) -> CalSyncResult<Event> {
        self.validate_permissions()?;
        let created = self.coordinator.async_add_event(event).await?;
        self.raise_event(BusEventKind::Created, &created.id);
        Ok(created)
    }

    /// Modify an event, or with `recurrence_range` every following occurrence
    /// of the series `recurrence_id`.
    pub async fn async_modify_calendar_event(
        &self,
        event_id: &str,
        recurrence_id: Option<&str>,
        recurrence_range: Option<&str>,
        patch: &EventPatch,
    ) -> CalSyncResult<Event> {
        self.validate_permissions()?;
        self.reject_group_calendar()?;

        let (target, kind) = match recurrence_range {
            Some(_) => (
                recurrence_id.unwrap_or(event_id),
                BusEventKind::ModifiedRecurrences,
            ),
            None => (event_id, BusEventKind::Modified),
        };
        let patched = self.coordinator.async_patch_event(target, patch).await?;
        self.raise_event(kind, target);
        Ok(patched)
    }

    pub async fn async_remove_calendar_event(
        &self,
        event_id: &str,
        recurrence_id: Option<&str>,
        recurrence_range: Option<&str>,
    ) -> CalSyncResult<()> {
        self.validate_permissions()?;
        self.reject_group_calendar()?;

        let (target, kind) = match recurrence_range {
            Some(_) => (
                recurrence_id.unwrap_or(event_id),
                BusEventKind::RemovedRecurrences,
            ),
            None => (event_id, BusEventKind::Removed),
        };
        self.coordinator.async_delete_event(target).await?;
        self.raise_event(kind, target);
        Ok(())
    }

    pub async fn async_respond_calendar_event(
        &self,
        event_id: &str,
        response: EventResponse,
        send_response: bool,
        message: Option<&str>,
    ) -> CalSyncResult<()> {
        self.validate_permissions()?;
        self.reject_group_calendar()?;

        self.coordinator
            .async_respond_event(event_id, response, message, send_response)
            .await?;
        self.raise_event(BusEventKind::Responded, event_id);
        Ok(())
    }

    fn validate_permissions(&self) -> CalSyncResult<()> {
        self.coordinator.authorize()?;
        if !self.update_supported {
            return Err(CalSyncError::CalendarNotEditable(self.name().to_string()));
        }
        Ok(())
    }

    fn reject_group_calendar(&self) -> CalSyncResult<()> {
        if self.group_calendar {
            return Err(CalSyncError::GroupCalendar(self.entity_id.clone()));
        }
        Ok(())
    }

    fn raise_event(&self, kind: BusEventKind, event_id: &str) {
        self.bus.fire(BusEvent {
            kind,
            event_id: event_id.to_string(),
            calendar: self.name().to_string(),
        });
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EntityState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
