//! Provider-neutral event types.
//!
//! Remote sources convert their API responses into these types, and the sync
//! manager, timeline and resolver work exclusively with them.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalSyncError, CalSyncResult};

/// A single calendar occurrence (possibly one instance of a recurring series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque identifier, stable across syncs and unique within one calendar.
    pub id: String,
    pub subject: String,
    /// Rich text body, sanitised when converted for display.
    pub body: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,

    /// Identifier of the series master when this is an occurrence of a recurring event.
    #[serde(default)]
    pub series_id: Option<String>,
    /// RRULE and EXDATEs for series masters. Masters are expanded before storage.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,

    #[serde(default)]
    pub sensitivity: Sensitivity,

    /// Last modification timestamp, used for delta comparison.
    pub updated: Option<DateTime<Utc>>,
}

/// Recurrence rule for a series master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    /// The RRULE value, without the `RRULE:` prefix (e.g. `FREQ=WEEKLY;BYDAY=MO`).
    pub rrule: String,
    #[serde(default)]
    pub exdates: Vec<EventTime>,
}

/// Start or end of an event: an instant, or a date for all-day events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    /// Date-only value, interpreted in the viewer's local calendar day.
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Normal,
    Personal,
    Private,
    Confidential,
}

impl std::str::FromStr for Sensitivity {
    type Err = CalSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Sensitivity::Normal),
            "personal" => Ok(Sensitivity::Personal),
            "private" => Ok(Sensitivity::Private),
            "confidential" => Ok(Sensitivity::Confidential),
            other => Err(CalSyncError::Config(format!("Unknown sensitivity '{other}'"))),
        }
    }
}

/// Attendee response to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResponse {
    Accept,
    Tentative,
    Decline,
}

/// Fields for an event that does not exist yet. The remote assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub subject: String,
    pub start: EventTime,
    pub end: EventTime,
    pub body: Option<String>,
    pub location: Option<String>,
    pub rrule: Option<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    pub subject: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub body: Option<String>,
    pub location: Option<String>,
    pub rrule: Option<String>,
    pub sensitivity: Option<Sensitivity>,
}

/// Instant at which `date` begins in `tz`, expressed in UTC.
///
/// Zones that skip local midnight (DST transitions at 00:00) start the day at
/// the first valid local time after the gap.
pub fn start_of_local_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

impl EventTime {
    /// Normalize to a UTC instant. Dates resolve to local midnight in `tz`.
    pub fn to_utc(&self, tz: &Tz) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => start_of_local_day(*d, tz),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// The local calendar date this time falls on.
    pub fn date_in(&self, tz: &Tz) -> NaiveDate {
        match self {
            EventTime::DateTime(dt) => dt.with_timezone(tz).date_naive(),
            EventTime::Date(d) => *d,
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Event {
    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }

    pub fn start_utc(&self, tz: &Tz) -> DateTime<Utc> {
        self.start.to_utc(tz)
    }

    pub fn end_utc(&self, tz: &Tz) -> DateTime<Utc> {
        self.end.to_utc(tz)
    }

    /// Key used to order events for display: all-day events sort as if they
    /// began at local midnight.
    pub fn sort_key(&self, tz: &Tz) -> DateTime<Utc> {
        self.start_utc(tz)
    }

    /// Check the invariants every stored event must satisfy.
    pub fn validate(&self) -> CalSyncResult<()> {
        if self.id.is_empty() {
            return Err(CalSyncError::malformed("", "missing identifier"));
        }
        let ordered = match (&self.start, &self.end) {
            (EventTime::Date(s), EventTime::Date(e)) => s <= e,
            (s, e) => s.to_utc(&Tz::UTC) <= e.to_utc(&Tz::UTC),
        };
        if !ordered {
            return Err(CalSyncError::malformed(&self.id, "end is before start"));
        }
        Ok(())
    }

    /// Whether this (incoming) version should replace `stored`.
    ///
    /// A newer modification stamp wins; without stamps on both sides any
    /// content difference counts as a modification.
    pub fn supersedes(&self, stored: &Event) -> bool {
        match (self.updated, stored.updated) {
            (Some(incoming), Some(current)) => incoming > current,
            _ => self != stored,
        }
    }

    /// Build the event a remote would return for `draft` under `id`.
    pub fn from_new(id: &str, draft: &NewEvent) -> Self {
        Event {
            id: id.to_string(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            location: draft.location.clone(),
            start: draft.start,
            end: draft.end,
            series_id: None,
            recurrence: draft.rrule.as_ref().map(|rrule| Recurrence {
                rrule: rrule.clone(),
                exdates: Vec::new(),
            }),
            sensitivity: draft.sensitivity,
            updated: Some(Utc::now()),
        }
    }

    /// Apply a partial update in place.
    pub fn apply_patch(&mut self, patch: &EventPatch) {
        if let Some(subject) = &patch.subject {
            self.subject = subject.clone();
        }
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(end) = patch.end {
            self.end = end;
        }
        if let Some(body) = &patch.body {
            self.body = Some(body.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(rrule) = &patch.rrule {
            self.recurrence = Some(Recurrence {
                rrule: rrule.clone(),
                exdates: Vec::new(),
            });
        }
        if let Some(sensitivity) = patch.sensitivity {
            self.sensitivity = sensitivity;
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timed(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            subject: "Standup".to_string(),
            body: None,
            location: None,
            start: EventTime::DateTime(start),
            end: EventTime::DateTime(end),
            series_id: None,
            recurrence: None,
            sensitivity: Sensitivity::Normal,
            updated: None,
        }
    }

    #[test]
    fn test_all_day_sort_key_is_local_midnight_in_utc() {
        let mut event = timed(
            "a",
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        );
        event.start = EventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        event.end = EventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            event.sort_key(&tz),
            Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap()
        );
        assert_eq!(
            event.sort_key(&Tz::UTC),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_start_of_local_day_skips_midnight_gap() {
        // Santiago springs forward at local midnight
        let tz: Tz = "America/Santiago".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let start = start_of_local_day(date, &tz);
        assert_eq!(start.with_timezone(&tz).date_naive(), date);
    }

    #[test]
    fn test_validate_rejects_inverted_interval() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let event = timed("x", now, now - Duration::hours(1));
        assert!(matches!(
            event.validate(),
            Err(CalSyncError::MalformedEvent { .. })
        ));
        assert!(timed("y", now, now).validate().is_ok());
    }

    #[test]
    fn test_supersedes_uses_modification_stamp() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut stored = timed("x", now, now + Duration::hours(1));
        stored.updated = Some(now);

        let mut incoming = stored.clone();
        incoming.subject = "Renamed".to_string();
        incoming.updated = Some(now - Duration::minutes(5));
        assert!(!incoming.supersedes(&stored));

        incoming.updated = Some(now + Duration::minutes(5));
        assert!(incoming.supersedes(&stored));
    }

    #[test]
    fn test_supersedes_without_stamps_compares_content() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let stored = timed("x", now, now + Duration::hours(1));
        assert!(!stored.clone().supersedes(&stored));

        let mut changed = stored.clone();
        changed.location = Some("Room 4".to_string());
        assert!(changed.supersedes(&stored));
    }

    #[test]
    fn test_apply_patch_only_touches_given_fields() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut event = timed("x", now, now + Duration::hours(1));
        event.body = Some("agenda".to_string());

        event.apply_patch(&EventPatch {
            subject: Some("Retro".to_string()),
            ..Default::default()
        });

        assert_eq!(event.subject, "Retro");
        assert_eq!(event.body.as_deref(), Some("agenda"));
        assert_eq!(event.start, EventTime::DateTime(now));
    }
}
