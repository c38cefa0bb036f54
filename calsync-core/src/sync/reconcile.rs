//! Folding remote changes into a stored event set.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::date_range::DateRange;
use crate::event::Event;
use crate::remote::{EventChange, EventDelta};
use crate::sync::filter::SourceFilter;
use crate::sync::recurrence::{expand_master, is_generated_occurrence};
use crate::sync::report::{DiffKind, SyncReport};

/// Applies changes to the events of one scope and tallies what changed.
///
/// Series masters are expanded into occurrences, events rejected by the
/// source filter are treated as deletions, and everything outside the
/// window is pruned on [`finish`](Reconciler::finish). In full mode any
/// stored event the remote did not mention is removed.
pub struct Reconciler<'a> {
    events: HashMap<String, Event>,
    seen: HashSet<String>,
    window: DateRange,
    tz: Tz,
    filter: &'a SourceFilter,
    full: bool,
    report: SyncReport,
}

impl<'a> Reconciler<'a> {
    pub fn new(current: Vec<Event>, window: DateRange, tz: Tz, filter: &'a SourceFilter) -> Self {
        Reconciler {
            events: current.into_iter().map(|e| (e.id.clone(), e)).collect(),
            seen: HashSet::new(),
            window,
            tz,
            filter,
            full: false,
            report: SyncReport::default(),
        }
    }

    /// Treat the changes that follow as a complete listing of the window.
    pub fn set_full(&mut self, full: bool) {
        self.full = full;
    }

    pub fn apply_delta(&mut self, delta: EventDelta) {
        if delta.full {
            self.full = true;
        }
        for change in delta.changes {
            self.apply(change);
        }
    }

    pub fn apply(&mut self, change: EventChange) {
        match change {
            EventChange::Upsert { event } => self.upsert(event),
            EventChange::Delete { id } => self.delete(&id),
            EventChange::SeriesRange {
                series_id,
                from,
                replacement,
            } => self.series_range(&series_id, from, replacement),
        }
    }

    pub fn upsert(&mut self, event: Event) {
        if let Err(e) = event.validate() {
            warn!(error = %e, "skipping invalid event from remote");
            // Keep whatever was stored before rather than dropping it on a full pass
            self.seen.insert(event.id);
            return;
        }

        if !self.filter.accepts(&event) {
            debug!(id = %event.id, "event excluded by source filter");
            self.delete(&event.id);
            return;
        }

        if event.recurrence.is_some() {
            self.upsert_master(event);
            return;
        }

        if !self.window.overlaps(event.start_utc(&self.tz), event.end_utc(&self.tz)) {
            // Moved out of the window
            self.remove(&event.id);
            return;
        }

        self.put(event);
    }

    fn upsert_master(&mut self, master: Event) {
        let occurrences = match expand_master(&master, &self.window, &self.tz) {
            Ok(occurrences) => occurrences,
            Err(e) => {
                warn!(error = %e, "keeping stored occurrences of unexpandable series");
                let kept: Vec<String> = self
                    .events
                    .keys()
                    .filter(|id| is_generated_occurrence(id, &master.id))
                    .cloned()
                    .collect();
                self.seen.extend(kept);
                return;
            }
        };

        let fresh: HashSet<&str> = occurrences.iter().map(|o| o.id.as_str()).collect();
        let stale: Vec<String> = self
            .events
            .keys()
            .filter(|id| *id == &master.id || is_generated_occurrence(id, &master.id))
            .filter(|id| !fresh.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.remove(&id);
        }

        for occurrence in occurrences {
            self.put(occurrence);
        }
    }

    /// Remove `id` and, when it names a series, every occurrence of it.
    pub fn delete(&mut self, id: &str) {
        self.remove(id);
        let occurrences: Vec<String> = self
            .events
            .values()
            .filter(|e| e.series_id.as_deref() == Some(id))
            .map(|e| e.id.clone())
            .collect();
        for occurrence in occurrences {
            self.remove(&occurrence);
        }
    }

    /// Replace every occurrence of `series_id` starting at or after `from`.
    pub fn series_range(&mut self, series_id: &str, from: DateTime<Utc>, replacement: Vec<Event>) {
        let tz = self.tz;
        let doomed: Vec<String> = self
            .events
            .values()
            .filter(|e| e.series_id.as_deref() == Some(series_id) && e.start_utc(&tz) >= from)
            .map(|e| e.id.clone())
            .collect();
        for id in doomed {
            self.remove(&id);
        }
        for event in replacement {
            self.upsert(event);
        }
    }

    fn put(&mut self, event: Event) {
        self.seen.insert(event.id.clone());
        match self.events.get(&event.id) {
            None => {
                self.report.record(DiffKind::Create);
                self.events.insert(event.id.clone(), event);
            }
            Some(stored) if event.supersedes(stored) => {
                self.report.record(DiffKind::Update);
                self.events.insert(event.id.clone(), event);
            }
            Some(_) => {}
        }
    }

    fn remove(&mut self, id: &str) {
        self.seen.remove(id);
        if self.events.remove(id).is_some() {
            self.report.record(DiffKind::Delete);
        }
    }

    /// Prune and return the resulting events ordered by start, with the tally.
    pub fn finish(mut self) -> (Vec<Event>, SyncReport) {
        let window = self.window;
        let tz = self.tz;
        let doomed: Vec<String> = self
            .events
            .values()
            .filter(|e| {
                (self.full && !self.seen.contains(&e.id))
                    || !window.overlaps(e.start_utc(&tz), e.end_utc(&tz))
            })
            .map(|e| e.id.clone())
            .collect();
        for id in doomed {
            self.remove(&id);
        }

        let mut events: Vec<Event> = self.events.into_values().collect();
        events.sort_by(|a, b| {
            a.sort_key(&tz)
                .cmp(&b.sort_key(&tz))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut report = self.report;
        report.full = self.full;
        (events, report)
    }
}
