use anyhow::Result;
use calsync_core::CalendarEntity;
use calsync_core::registry::ServiceCall;
use owo_colors::OwoColorize;

use crate::app::App;

pub async fn run(
    app: &App,
    entity: &CalendarEntity,
    event_id: String,
    series: Option<String>,
) -> Result<()> {
    let recurrence_range = series.as_ref().map(|_| "THISANDFUTURE".to_string());
    let call = ServiceCall::Remove {
        event_id: event_id.clone(),
        recurrence_id: series,
        recurrence_range,
    };
    app.setup.services.dispatch(entity, call).await?;
    println!("{} {}", "-".red(), event_id.red());
    Ok(())
}
