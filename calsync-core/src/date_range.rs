//! Half-open time ranges used for fetch windows and queries.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SYNC_EVENT_MAX_TIME_DAYS, DEFAULT_SYNC_EVENT_MIN_TIME_DAYS};
use crate::event::start_of_local_day;

/// `[from, to)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange { from, to }
    }

    /// Fetch window anchored on the start of the local day containing `now`:
    /// `[day_start + min_days, day_start + max_days + 1 day)`.
    ///
    /// Anchoring keeps the window identical for a whole local day, so a delta
    /// cursor stays valid until midnight.
    pub fn sync_window(now: DateTime<Utc>, tz: &Tz, min_days: i64, max_days: i64) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let day_start = start_of_local_day(today, tz);
        DateRange {
            from: day_start + Duration::days(min_days),
            to: day_start + Duration::days(max_days + 1),
        }
    }

    /// The whole local day containing `now`.
    pub fn local_day(now: DateTime<Utc>, tz: &Tz) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let start = start_of_local_day(today, tz);
        DateRange {
            from: start,
            to: start + Duration::days(1),
        }
    }

    /// Whether `[start, end)` intersects this range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.to && end > self.from
    }

    /// Whether `[start, end]` lies entirely inside this range.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start >= self.from && end <= self.to
    }

    /// Parse CLI-style date arguments (YYYY-MM-DD, local days in `tz`).
    /// - `from` defaults to the start of today
    /// - `to` is inclusive and defaults to one day after `from`
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Self, String> {
        let from_dt = match from {
            Some(s) => start_of_local_day(parse_date(s)?, tz),
            None => Self::local_day(now, tz).from,
        };

        let to_dt = match to {
            Some(s) => start_of_local_day(parse_date(s)? + Duration::days(1), tz),
            None => from_dt + Duration::days(1),
        };

        if to_dt <= from_dt {
            return Err(format!("Range end '{}' is not after its start", to.unwrap_or("")));
        }

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }

    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339()
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339()
    }
}

impl Default for DateRange {
    /// Default synchronized window around now, in UTC.
    fn default() -> Self {
        DateRange::sync_window(
            Utc::now(),
            &Tz::UTC,
            DEFAULT_SYNC_EVENT_MIN_TIME_DAYS,
            DEFAULT_SYNC_EVENT_MAX_TIME_DAYS,
        )
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sync_window_is_stable_within_a_day() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let morning = Utc.with_ymd_and_hms(2025, 6, 10, 5, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 6, 10, 20, 0, 0).unwrap();

        let a = DateRange::sync_window(morning, &tz, -15, 90);
        let b = DateRange::sync_window(evening, &tz, -15, 90);
        assert_eq!(a, b);
        assert!(a.covers(morning - Duration::days(15), morning + Duration::days(90)));
        assert!(b.covers(evening - Duration::days(15), evening + Duration::days(90)));
    }

    #[test]
    fn test_overlaps_is_half_open() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let range = DateRange::new(start, start + Duration::hours(1));

        assert!(!range.overlaps(start - Duration::hours(1), start));
        assert!(!range.overlaps(start + Duration::hours(1), start + Duration::hours(2)));
        assert!(range.overlaps(start - Duration::hours(1), start + Duration::minutes(1)));
    }

    #[test]
    fn test_from_args_makes_to_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let range = DateRange::from_args(Some("2025-02-01"), Some("2025-02-03"), now, &Tz::UTC)
            .unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(range.to, Utc.with_ymd_and_hms(2025, 2, 4, 0, 0, 0).unwrap());

        assert!(DateRange::from_args(Some("02/01/2025"), None, now, &Tz::UTC).is_err());
    }
}
