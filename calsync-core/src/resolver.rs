//! Picks the single event considered "now" for a calendar.
//!
//! Each candidate lands in at most one bucket:
//! - started: timed, `start <= now < end`
//! - all-day and not yet finished: `now < end`
//! - not started: timed, `now < start`
//!
//! The first candidate seen in each bucket is kept, and the buckets are
//! ranked started > all-day > not started. Candidates are not re-sorted, so
//! the caller's iteration order decides ties within a bucket.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Started,
    AllDayUnfinished,
    NotStarted,
}

/// The bucket `event` falls into at `now`, if any.
pub fn classify(event: &Event, now: DateTime<Utc>, tz: &Tz) -> Option<Bucket> {
    let start = event.start_utc(tz);
    let end = event.end_utc(tz);
    if event.is_all_day() {
        return (now < end).then_some(Bucket::AllDayUnfinished);
    }
    if start <= now && now < end {
        Some(Bucket::Started)
    } else if now < start {
        Some(Bucket::NotStarted)
    } else {
        None
    }
}

/// Resolve the current event among `candidates`.
pub fn resolve_current<'a, I>(candidates: I, now: DateTime<Utc>, tz: &Tz) -> Option<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut started = None;
    let mut all_day = None;
    let mut not_started = None;

    for event in candidates {
        let slot = match classify(event, now, tz) {
            Some(Bucket::Started) => &mut started,
            Some(Bucket::AllDayUnfinished) => &mut all_day,
            Some(Bucket::NotStarted) => &mut not_started,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(event);
        }
    }

    started.or(all_day).or(not_started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{all_day_event, at, timed_event};

    #[test]
    fn test_started_beats_all_day_and_upcoming() {
        let now = at(12 * 60);
        let upcoming = timed_event("upcoming", "Review", 13 * 60, 14 * 60);
        let started = timed_event("started", "Workshop", 11 * 60, 13 * 60);
        let today = all_day_event("today", "Holiday", 2025, 5, 1, 1);

        let candidates = [&upcoming, &today, &started];
        let current = resolve_current(candidates, now, &Tz::UTC).unwrap();
        assert_eq!(current.id, "started");
    }

    #[test]
    fn test_all_day_beats_tomorrow() {
        let now = at(12 * 60);
        let today = all_day_event("today", "Holiday", 2025, 5, 1, 1);
        let tomorrow = timed_event("tomorrow", "Standup", 33 * 60, 34 * 60);

        let current = resolve_current([&tomorrow, &today], now, &Tz::UTC).unwrap();
        assert_eq!(current.id, "today");
    }

    #[test]
    fn test_first_in_bucket_wins() {
        let now = at(0);
        let later = timed_event("later", "B", 120, 180);
        let sooner = timed_event("sooner", "A", 60, 90);

        let current = resolve_current([&later, &sooner], now, &Tz::UTC).unwrap();
        assert_eq!(current.id, "later");
    }

    #[test]
    fn test_finished_events_are_ignored() {
        let now = at(12 * 60);
        let done = timed_event("done", "Breakfast", 8 * 60, 9 * 60);
        assert!(resolve_current([&done], now, &Tz::UTC).is_none());
        assert_eq!(classify(&done, now, &Tz::UTC), None);

        // An event ending exactly now has finished
        let edge = timed_event("edge", "Call", 11 * 60, 12 * 60);
        assert_eq!(classify(&edge, now, &Tz::UTC), None);
    }

    #[test]
    fn test_all_day_finished_yesterday_is_ignored() {
        let now = at(12 * 60);
        let yesterday = all_day_event("y", "Trip", 2025, 4, 30, 1);
        assert_eq!(classify(&yesterday, now, &Tz::UTC), None);
    }
}
