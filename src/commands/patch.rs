use anyhow::Result;
use calsync_core::registry::ServiceCall;
use calsync_core::{CalendarEntity, EventPatch};
use owo_colors::OwoColorize;

use crate::app::App;

/// With `series`, the change applies to every occurrence of that series.
pub async fn run(
    app: &App,
    entity: &CalendarEntity,
    event_id: String,
    series: Option<String>,
    patch: EventPatch,
) -> Result<()> {
    let recurrence_range = series.as_ref().map(|_| "THISANDFUTURE".to_string());
    let call = ServiceCall::Modify {
        event_id: event_id.clone(),
        recurrence_id: series,
        recurrence_range,
        patch,
    };
    app.setup.services.dispatch(entity, call).await?;
    println!("{} {}", "~".yellow(), event_id.yellow());
    Ok(())
}
