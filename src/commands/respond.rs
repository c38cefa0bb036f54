use anyhow::Result;
use calsync_core::registry::ServiceCall;
use calsync_core::{CalendarEntity, EventResponse};
use owo_colors::OwoColorize;

use crate::app::App;

pub async fn run(
    app: &App,
    entity: &CalendarEntity,
    event_id: String,
    response: EventResponse,
    send_response: bool,
    message: Option<String>,
) -> Result<()> {
    let call = ServiceCall::Respond {
        event_id: event_id.clone(),
        response,
        send_response,
        message,
    };
    app.setup.services.dispatch(entity, call).await?;
    println!("{} {} {:?}", "✓".green(), event_id, response);
    Ok(())
}
