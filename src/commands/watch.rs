use std::sync::Arc;

use anyhow::Result;
use calsync_core::CalendarEntity;
use owo_colors::OwoColorize;
use tokio::task::JoinSet;

use crate::app::App;
use crate::commands::now::current_line;

/// Poll every entity's coordinator and print its current event after each
/// cycle until Ctrl-C.
pub async fn run(app: &App, entities: Vec<Arc<CalendarEntity>>) -> Result<()> {
    let tz = app.time_zone();
    let mut pollers = Vec::new();
    let mut tasks: JoinSet<()> = JoinSet::new();

    for entity in entities {
        let mut updates = entity.coordinator().subscribe();
        pollers.push(entity.coordinator().spawn_polling());

        tasks.spawn(async move {
            let mut last = None;
            while updates.changed().await.is_ok() {
                entity.update_from_timeline();
                let line = current_line(&entity, tz);
                if last.as_ref() != Some(&line) {
                    println!("{line}");
                    last = Some(line);
                }
            }
        });
    }

    let mut bus = app.bus.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(event) = bus.recv() => {
                println!("{} {} {}", "»".cyan(), event.kind, event.event_id.dimmed());
            }
        }
    }

    for poller in pollers {
        poller.abort();
    }
    tasks.shutdown().await;
    Ok(())
}
