use std::sync::Arc;

use anyhow::Result;
use calsync_core::CalendarEntity;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::Render;

pub async fn run(app: &App, entities: Vec<Arc<CalendarEntity>>) -> Result<()> {
    let tz = app.time_zone();
    for entity in &entities {
        // A failed refresh still leaves the last good data to show
        if let Err(e) = entity.async_update().await {
            eprintln!("{} {}: {}", "!".yellow(), entity.name(), e);
        }
        println!("{}", current_line(entity, tz));
    }
    Ok(())
}

/// "<name>: <current event>" or "<name>: nothing right now", with sync status.
pub fn current_line(entity: &CalendarEntity, tz: chrono_tz::Tz) -> String {
    let status = entity.coordinator().status();
    let current = match entity.current_event() {
        Some(current) => current.render(tz),
        None => "nothing right now".dimmed().to_string(),
    };
    format!("{}: {} {}", entity.name().bold(), current, status.render(tz))
}
