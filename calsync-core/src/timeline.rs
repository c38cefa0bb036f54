//! In-memory interval index over one calendar's events.
//!
//! Entries are kept sorted by normalized start. An overlap query binary
//! searches the start bounds and scans the candidates in between; the lower
//! bound is widened by the longest event duration in the timeline. Cost is
//! O(log n + c) where c counts events starting inside
//! `[range_start - longest_event, range_end)`. A single very long event (a
//! months-long all-day block) widens that slice towards a linear scan, which
//! is fine for one calendar's near-term events but is the ceiling of this
//! structure.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::event::Event;

#[derive(Debug, Clone)]
struct Entry {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    id: String,
}

/// Immutable snapshot of a calendar's events.
///
/// All-day events are normalized to local-day boundaries in the timeline's
/// zone when the timeline is built; every comparison happens in UTC.
#[derive(Debug, Clone)]
pub struct Timeline {
    tz: Tz,
    events: HashMap<String, Event>,
    index: Vec<Entry>,
    max_span: Duration,
}

impl Timeline {
    /// Build a timeline. Later events replace earlier ones with the same id.
    pub fn new(events: impl IntoIterator<Item = Event>, tz: Tz) -> Self {
        let mut by_id: HashMap<String, Event> = HashMap::new();
        for event in events {
            by_id.insert(event.id.clone(), event);
        }

        let mut index: Vec<Entry> = by_id
            .values()
            .map(|e| Entry {
                start: e.start_utc(&tz),
                end: e.end_utc(&tz),
                id: e.id.clone(),
            })
            .collect();
        index.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        let max_span = index
            .iter()
            .map(|e| e.end - e.start)
            .max()
            .unwrap_or_else(Duration::zero)
            .max(Duration::zero());

        Timeline {
            tz,
            events: by_id,
            index,
            max_span,
        }
    }

    pub fn empty(tz: Tz) -> Self {
        Timeline::new(Vec::new(), tz)
    }

    pub fn time_zone(&self) -> &Tz {
        &self.tz
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    /// All events, in ascending normalized start order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.index.iter().filter_map(|entry| self.events.get(&entry.id))
    }

    /// Every event whose `[start, end)` intersects `[range_start, range_end)`.
    ///
    /// Results come back in start order, but callers should not rely on it.
    pub fn overlapping(&self, range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> Vec<&Event> {
        if range_end <= range_start {
            return Vec::new();
        }

        let earliest = range_start - self.max_span;
        let lo = self.index.partition_point(|e| e.start <= earliest);
        let hi = self.index.partition_point(|e| e.start < range_end);
        if lo >= hi {
            return Vec::new();
        }

        self.index[lo..hi]
            .iter()
            .filter(|e| e.start < range_end && e.end > range_start)
            .filter_map(|e| self.events.get(&e.id))
            .collect()
    }
}
