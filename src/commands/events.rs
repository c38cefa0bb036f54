use std::sync::Arc;

use anyhow::Result;
use calsync_core::{CalendarEntity, CalendarEventView, DateRange};
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::{Render, format_date_label};

pub async fn run(
    app: &App,
    entities: Vec<Arc<CalendarEntity>>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let tz = app.time_zone();
    let range = DateRange::from_args(from, to, Utc::now(), &tz).map_err(|e| anyhow::anyhow!(e))?;

    let mut all_events: Vec<(String, CalendarEventView)> = Vec::new();
    for entity in &entities {
        if let Err(e) = entity.coordinator().async_refresh().await {
            eprintln!("{} {}: {}", "!".yellow(), entity.name(), e);
        }
        for view in entity.async_get_events(range.from, range.to).await? {
            all_events.push((entity.name().to_string(), view));
        }
    }

    // Each entity's list is already ordered; merge them
    all_events.sort_by_key(|(_, view)| view.start.to_utc(&tz));

    if all_events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let mut current_date = None;
    for (name, view) in &all_events {
        let date = view.start.date_in(&tz);
        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, tz).bold());
            current_date = Some(date);
        }

        let tag = format!("[{name}]");
        if entities.len() > 1 {
            println!("  {} {}", view.render(tz), tag.dimmed());
        } else {
            println!("  {}", view.render(tz));
        }
    }

    Ok(())
}
