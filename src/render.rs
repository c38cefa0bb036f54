//! Colored terminal output for calsync types.

use calsync_core::{CalendarEventView, CurrentEvent, EventTime, SyncStatus};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self, tz: Tz) -> String;
}

impl Render for CalendarEventView {
    fn render(&self, tz: Tz) -> String {
        let mut line = format!("{} {}", format_time(&self.start, tz), self.summary);
        if let Some(location) = &self.location {
            line.push_str(&format!(" {}", format!("@ {location}").dimmed()));
        }
        if self.recurrence_id.is_some() {
            line.push_str(&format!(" {}", "↻".dimmed()));
        }
        line
    }
}

impl Render for CurrentEvent {
    fn render(&self, tz: Tz) -> String {
        let until = match self.view.end {
            EventTime::Date(_) => String::new(),
            end => format!(" until {}", format_time(&end, tz).trim()),
        };
        let marker = if self.offset_reached {
            "●".green().to_string()
        } else {
            "○".dimmed().to_string()
        };
        format!("{} {}{}", marker, self.view.summary.bold(), until.dimmed())
    }
}

impl Render for SyncStatus {
    fn render(&self, tz: Tz) -> String {
        match self {
            SyncStatus::NeverSynced => "never synced".dimmed().to_string(),
            SyncStatus::Fresh { synced_at } => {
                let at = synced_at.with_timezone(&tz).format("%H:%M");
                format!("synced at {at}").dimmed().to_string()
            }
            SyncStatus::Stale {
                last_success,
                error,
            } => {
                let since = match last_success {
                    Some(at) => format!("stale since {}", at.with_timezone(&tz).format("%H:%M")),
                    None => "not synced yet".to_string(),
                };
                format!("{since}: {error}").yellow().to_string()
            }
        }
    }
}

/// Day heading for a group of events (e.g. "Today", "Tomorrow", "Wed Feb 25").
pub fn format_date_label(date: NaiveDate, tz: Tz) -> String {
    let today = Utc::now().with_timezone(&tz).date_naive();
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

/// The time portion of an event (e.g. "  15:00" or "all-day").
pub fn format_time(time: &EventTime, tz: Tz) -> String {
    match time {
        EventTime::Date(_) => "all-day".to_string(),
        EventTime::DateTime(dt) => format!("{:>7}", dt.with_timezone(&tz).format("%H:%M")),
    }
}
