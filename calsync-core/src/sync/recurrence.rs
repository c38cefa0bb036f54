//! RRULE expansion for series masters.
//!
//! Remote sources may hand back a series master instead of its occurrences.
//! Masters are expanded into concrete occurrences inside the sync window;
//! the master itself is never stored. Occurrences are computed in UTC, so a
//! timed series does not follow DST shifts of the zone it was created in.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::warn;

use crate::constants::MAX_EXPANDED_OCCURRENCES;
use crate::date_range::DateRange;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventTime, Recurrence};

/// Identifier given to a generated occurrence of `series_id` starting at `start`.
pub fn occurrence_id(series_id: &str, start: &EventTime) -> String {
    format!("{series_id}:{start}")
}

/// Whether `id` names an occurrence generated from `series_id`.
pub(crate) fn is_generated_occurrence(id: &str, series_id: &str) -> bool {
    id.strip_prefix(series_id)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Build an iCalendar-format RRULE string for the rrule crate parser.
fn build_rrule_string(start: &EventTime, recurrence: &Recurrence) -> String {
    let mut lines = Vec::new();

    // The rrule crate needs a datetime, so all-day dates become midnight UTC
    lines.push(match start {
        EventTime::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
        EventTime::DateTime(dt) => format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
    });

    let rrule = recurrence
        .rrule
        .strip_prefix("RRULE:")
        .unwrap_or(&recurrence.rrule);
    lines.push(format!("RRULE:{rrule}"));

    for exdate in &recurrence.exdates {
        lines.push(match exdate {
            EventTime::Date(d) => format!("EXDATE:{}T000000Z", d.format("%Y%m%d")),
            EventTime::DateTime(dt) => format!("EXDATE:{}", dt.format("%Y%m%dT%H%M%SZ")),
        });
    }

    lines.join("\n")
}

/// Expand `master` into the occurrences overlapping `window`.
///
/// Each occurrence carries `series_id = master.id` and an id from
/// [`occurrence_id`]. Non-recurring events expand to nothing.
pub fn expand_master(master: &Event, window: &DateRange, tz: &Tz) -> CalSyncResult<Vec<Event>> {
    let recurrence = match &master.recurrence {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let rrule_set: RRuleSet = build_rrule_string(&master.start, recurrence)
        .parse()
        .map_err(|e| {
            CalSyncError::Recurrence(format!(
                "Failed to parse RRULE for event '{}': {}",
                master.id, e
            ))
        })?;

    // Margin covers the master's duration plus the widest UTC offset, since
    // all-day occurrences are computed at UTC midnight.
    let duration = master.end_utc(&Tz::UTC) - master.start_utc(&Tz::UTC);
    let margin = duration.max(Duration::zero()) + Duration::days(2);
    let utc: rrule::Tz = Utc.into();
    let after = (window.from - margin).with_timezone(&utc);
    let before = (window.to + margin).with_timezone(&utc);

    let result = rrule_set
        .after(after)
        .before(before)
        .all(MAX_EXPANDED_OCCURRENCES);
    if result.limited {
        warn!(
            series = %master.id,
            limit = MAX_EXPANDED_OCCURRENCES,
            "recurring series truncated during expansion"
        );
    }

    let occurrences = result
        .dates
        .iter()
        .map(|occ| build_occurrence(master, &occ.with_timezone(&Utc), duration))
        .filter(|occ| window.overlaps(occ.start_utc(tz), occ.end_utc(tz)))
        .collect();

    Ok(occurrences)
}

fn build_occurrence(master: &Event, occ_start: &DateTime<Utc>, duration: Duration) -> Event {
    let (start, end) = match (&master.start, &master.end) {
        (EventTime::Date(d_start), EventTime::Date(d_end)) => {
            let days = *d_end - *d_start;
            let date = occ_start.date_naive();
            (EventTime::Date(date), EventTime::Date(date + days))
        }
        _ => (
            EventTime::DateTime(*occ_start),
            EventTime::DateTime(*occ_start + duration),
        ),
    };

    Event {
        id: occurrence_id(&master.id, &start),
        subject: master.subject.clone(),
        body: master.body.clone(),
        location: master.location.clone(),
        start,
        end,
        series_id: Some(master.id.clone()),
        recurrence: None,
        sensitivity: master.sensitivity,
        updated: master.updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{all_day_event, base, timed_event};
    use chrono::NaiveDate;

    fn weekly(mut master: Event, rrule: &str) -> Event {
        master.recurrence = Some(Recurrence {
            rrule: rrule.to_string(),
            exdates: Vec::new(),
        });
        master
    }

    #[test]
    fn test_expands_timed_series_inside_window() {
        // base() is Thursday 2025-05-01
        let master = weekly(timed_event("m", "Standup", 9 * 60, 9 * 60 + 15), "FREQ=WEEKLY");
        let window = DateRange::new(base(), base() + Duration::days(21));

        let occurrences = expand_master(&master, &window, &Tz::UTC).unwrap();
        assert_eq!(occurrences.len(), 3);
        for occ in &occurrences {
            assert_eq!(occ.series_id.as_deref(), Some("m"));
            assert!(is_generated_occurrence(&occ.id, "m"));
            assert_eq!(occ.end_utc(&Tz::UTC) - occ.start_utc(&Tz::UTC), Duration::minutes(15));
        }
        assert_eq!(
            occurrences[1].start,
            EventTime::DateTime(base() + Duration::days(7) + Duration::hours(9))
        );
    }

    #[test]
    fn test_exdates_are_skipped() {
        let mut master = weekly(timed_event("m", "Standup", 9 * 60, 10 * 60), "RRULE:FREQ=DAILY;COUNT=3");
        if let Some(recurrence) = master.recurrence.as_mut() {
            recurrence
                .exdates
                .push(EventTime::DateTime(base() + Duration::days(1) + Duration::hours(9)));
        }
        let window = DateRange::new(base(), base() + Duration::days(10));

        let occurrences = expand_master(&master, &window, &Tz::UTC).unwrap();
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn test_all_day_series_keeps_dates() {
        let master = weekly(all_day_event("h", "Gym", 2025, 5, 1, 1), "FREQ=DAILY;COUNT=2");
        let window = DateRange::new(base(), base() + Duration::days(10));

        let occurrences = expand_master(&master, &window, &Tz::UTC).unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(
            occurrences[1].start,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 5, 2).unwrap())
        );
        assert_eq!(
            occurrences[1].end,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 5, 3).unwrap())
        );
    }

    #[test]
    fn test_invalid_rrule_is_an_error() {
        let master = weekly(timed_event("m", "Bad", 0, 10), "FREQ=SOMETIMES");
        let window = DateRange::new(base(), base() + Duration::days(1));
        assert!(matches!(
            expand_master(&master, &window, &Tz::UTC),
            Err(CalSyncError::Recurrence(_))
        ));
    }

    #[test]
    fn test_generated_occurrence_prefix_needs_separator() {
        assert!(is_generated_occurrence("abc:2025-05-01", "abc"));
        assert!(!is_generated_occurrence("abcd:2025-05-01", "abc"));
        assert!(!is_generated_occurrence("abc", "abc"));
    }
}
