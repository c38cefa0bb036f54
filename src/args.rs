//! Turning command line strings into event fields.

use anyhow::{Context, Result};
use calsync_core::{EventPatch, EventTime, NewEvent, Sensitivity};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date (all-day) or a local date/time in `tz`.
///
/// RFC 3339 strings with an explicit offset are accepted too.
pub fn parse_event_time(input: &str, tz: Tz) -> Result<EventTime> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(EventTime::Date(date));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Ok(EventTime::DateTime(dt.with_timezone(&Utc)));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(EventTime::DateTime(local_to_utc(naive, tz)?));
        }
    }
    anyhow::bail!("Could not parse '{input}' as YYYY-MM-DD or YYYY-MM-DDTHH:MM")
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Result<chrono::DateTime<Utc>> {
    let local = naive
        .and_local_timezone(tz)
        .earliest()
        .with_context(|| format!("{naive} does not exist in {tz}"))?;
    Ok(local.with_timezone(&Utc))
}

/// Default end: one day after a date, one hour after a time.
fn default_end(start: EventTime) -> EventTime {
    match start {
        EventTime::Date(date) => EventTime::Date(date + Duration::days(1)),
        EventTime::DateTime(dt) => EventTime::DateTime(dt + Duration::hours(1)),
    }
}

pub fn new_event(
    subject: String,
    start: &str,
    end: Option<&str>,
    location: Option<String>,
    body: Option<String>,
    rrule: Option<String>,
    tz: Tz,
) -> Result<NewEvent> {
    let start = parse_event_time(start, tz)?;
    let end = match end {
        Some(end) => parse_event_time(end, tz)?,
        None => default_end(start),
    };
    check_order(start, end, tz)?;

    Ok(NewEvent {
        subject,
        start,
        end,
        body,
        location,
        rrule,
        sensitivity: Sensitivity::Normal,
    })
}

pub fn event_patch(
    subject: Option<String>,
    start: Option<&str>,
    end: Option<&str>,
    location: Option<String>,
    tz: Tz,
) -> Result<EventPatch> {
    let start = start.map(|s| parse_event_time(s, tz)).transpose()?;
    let end = end.map(|s| parse_event_time(s, tz)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        check_order(start, end, tz)?;
    }

    let patch = EventPatch {
        subject,
        start,
        end,
        location,
        ..EventPatch::default()
    };
    if patch == EventPatch::default() {
        anyhow::bail!("Nothing to change, pass at least one of --subject, --start, --end, --location");
    }
    Ok(patch)
}

fn check_order(start: EventTime, end: EventTime, tz: Tz) -> Result<()> {
    if start.is_date() != end.is_date() {
        anyhow::bail!("Start and end must both be dates or both be date/times");
    }
    if end.to_utc(&tz) <= start.to_utc(&tz) {
        anyhow::bail!("End must be after start");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_and_local_time() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(
            parse_event_time("2025-03-20", tz).unwrap(),
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap())
        );
        // CET is UTC+1 in March before the switch
        assert_eq!(
            parse_event_time("2025-03-20T15:00", tz).unwrap(),
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 14, 0, 0).unwrap())
        );
        assert_eq!(
            parse_event_time("2025-03-20T15:00:00Z", tz).unwrap(),
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap())
        );
        assert!(parse_event_time("next tuesday", tz).is_err());
    }

    #[test]
    fn test_new_event_default_end() {
        let event = new_event("Lunch".into(), "2025-03-20T12:00", None, None, None, None, Tz::UTC)
            .unwrap();
        assert_eq!(
            event.end,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 20, 13, 0, 0).unwrap())
        );

        let day = new_event("Off".into(), "2025-03-20", None, None, None, None, Tz::UTC).unwrap();
        assert_eq!(day.end, EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()));
    }

    #[test]
    fn test_rejects_mixed_or_reversed_times() {
        let mixed = new_event(
            "x".into(),
            "2025-03-20",
            Some("2025-03-20T12:00"),
            None,
            None,
            None,
            Tz::UTC,
        );
        assert!(mixed.is_err());

        let reversed = event_patch(None, Some("2025-03-20T12:00"), Some("2025-03-20T11:00"), None, Tz::UTC);
        assert!(reversed.is_err());
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert!(event_patch(None, None, None, None, Tz::UTC).is_err());
        let patch = event_patch(Some("Renamed".into()), None, None, None, Tz::UTC).unwrap();
        assert_eq!(patch.subject.as_deref(), Some("Renamed"));
    }
}
