//! The `!!<offset>` marker some users put in event subjects.
//!
//! `Dentist !!-0:30` means "treat this event as reached 30 minutes before it
//! starts". The marker is stripped from the subject for display and the
//! offset turns into a derived "offset reached" flag.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::{CalSyncError, CalSyncResult};

/// Split `subject` into the subject without its offset marker and the offset.
///
/// `prefix` is the marker, normally [`DEFAULT_OFFSET`](crate::constants::DEFAULT_OFFSET).
/// The value after the marker is `[+-]H:M` or a bare `[+-]M` meaning
/// minutes, at most two digits each. Anything after that is left in the
/// subject. Without a value the subject is returned as is with a zero offset.
pub fn extract_offset(subject: &str, prefix: &str) -> CalSyncResult<(String, Duration)> {
    let pattern = format!(r"{}([+-]?[0-9]{{0,2}}(:[0-9]{{0,2}})?)", regex::escape(prefix));
    let re = Regex::new(&pattern).map_err(|e| CalSyncError::InvalidOffset(e.to_string()))?;

    let Some(caps) = re.captures(subject) else {
        return Ok((subject.to_string(), Duration::zero()));
    };
    let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
        return Ok((subject.to_string(), Duration::zero()));
    };
    if value.as_str().is_empty() {
        return Ok((subject.to_string(), Duration::zero()));
    }

    let offset = parse_offset(value.as_str())?;
    let cleaned = format!("{}{}", &subject[..whole.start()], &subject[whole.end()..]);
    Ok((cleaned.trim().to_string(), offset))
}

/// Parse `[+-]H:M`, or `[+-]M` as minutes. The sign applies to the whole value.
fn parse_offset(value: &str) -> CalSyncResult<Duration> {
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let normalized = if digits.contains(':') {
        digits.to_string()
    } else {
        format!("0:{digits}")
    };

    let parts = normalized
        .split(':')
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| CalSyncError::InvalidOffset(value.to_string()))
        })
        .collect::<CalSyncResult<Vec<i64>>>()?;

    let offset = match parts.as_slice() {
        [hours, minutes] => Duration::hours(*hours) + Duration::minutes(*minutes),
        _ => return Err(CalSyncError::InvalidOffset(value.to_string())),
    };

    Ok(if negative { -offset } else { offset })
}

/// Whether `start + offset` has passed at `now`. A zero offset is never reached.
pub fn is_offset_reached(start: DateTime<Utc>, offset: Duration, now: DateTime<Utc>) -> bool {
    if offset.is_zero() {
        return false;
    }
    start + offset <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_OFFSET;
    use chrono::TimeZone;

    #[test]
    fn test_extracts_hours_and_minutes() {
        let (subject, offset) = extract_offset("Dentist !!-1:30", DEFAULT_OFFSET).unwrap();
        assert_eq!(subject, "Dentist");
        assert_eq!(offset, -(Duration::hours(1) + Duration::minutes(30)));
    }

    #[test]
    fn test_bare_number_is_minutes() {
        let (subject, offset) = extract_offset("Standup !!15 daily", DEFAULT_OFFSET).unwrap();
        assert_eq!(subject, "Standup  daily");
        assert_eq!(offset, Duration::minutes(15));

        let (_, offset) = extract_offset("Call !!-5", DEFAULT_OFFSET).unwrap();
        assert_eq!(offset, Duration::minutes(-5));
    }

    #[test]
    fn test_only_hours_and_minutes_are_consumed() {
        let (subject, offset) = extract_offset("x !!0:1:30", DEFAULT_OFFSET).unwrap();
        assert_eq!(subject, "x :30");
        assert_eq!(offset, Duration::minutes(1));
    }

    #[test]
    fn test_subject_without_marker_is_untouched() {
        let (subject, offset) = extract_offset("  Lunch  ", DEFAULT_OFFSET).unwrap();
        assert_eq!(subject, "  Lunch  ");
        assert!(offset.is_zero());

        let (subject, offset) = extract_offset("Wow!! great", DEFAULT_OFFSET).unwrap();
        assert_eq!(subject, "Wow!! great");
        assert!(offset.is_zero());
    }

    #[test]
    fn test_dangling_colon_is_invalid() {
        assert!(matches!(
            extract_offset("x !!1:", DEFAULT_OFFSET),
            Err(CalSyncError::InvalidOffset(_))
        ));
    }

    #[test]
    fn test_offset_reached() {
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        let offset = Duration::minutes(-30);

        assert!(!is_offset_reached(start, offset, start - Duration::minutes(31)));
        assert!(is_offset_reached(start, offset, start - Duration::minutes(30)));
        assert!(!is_offset_reached(start, Duration::zero(), start + Duration::hours(1)));
    }
}
