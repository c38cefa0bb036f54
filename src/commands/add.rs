use anyhow::Result;
use calsync_core::NewEvent;
use calsync_core::registry::ServiceCall;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::format_time;

pub async fn run(app: &App, entity: &calsync_core::CalendarEntity, event: NewEvent) -> Result<()> {
    let summary = format!(
        "{} {}",
        event.subject,
        format_time(&event.start, app.time_zone()).trim()
    );
    app.setup
        .services
        .dispatch(entity, ServiceCall::Create(event))
        .await?;
    println!("{} {}", "+".green(), summary.green());
    Ok(())
}
