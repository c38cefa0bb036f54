mod app;
mod args;
mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use app::App;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Keep a local timeline of your remote calendars and query it")]
struct Cli {
    /// Config file (defaults to ~/.config/calsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events through the entity pipeline
    Events {
        /// Only show this calendar entity (by name)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Show events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show what is happening right now
    Now {
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Keep polling and print the current event after every refresh
    Watch {
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Create an event
    Add {
        subject: String,

        /// Start: YYYY-MM-DD for all-day, or YYYY-MM-DDTHH:MM local time
        #[arg(short, long)]
        start: String,

        /// End (defaults to one hour, or one day for all-day events)
        #[arg(short, long)]
        end: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        body: Option<String>,

        /// Recurrence rule, e.g. "FREQ=WEEKLY;BYDAY=MO"
        #[arg(long)]
        rrule: Option<String>,

        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Change fields of an existing event
    Patch {
        event_id: String,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Apply to the whole series the occurrence belongs to
        #[arg(long)]
        series: Option<String>,

        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Delete an event
    Delete {
        event_id: String,

        /// Delete the whole series the occurrence belongs to
        #[arg(long)]
        series: Option<String>,

        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Answer an invitation
    Respond {
        event_id: String,

        #[arg(value_enum)]
        response: Response,

        /// Message sent with the response
        #[arg(short, long)]
        message: Option<String>,

        /// Don't notify the organizer
        #[arg(long)]
        quiet: bool,

        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Forget everything stored locally for this configuration
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum Response {
    Accept,
    Tentative,
    Decline,
}

impl From<Response> for calsync_core::EventResponse {
    fn from(response: Response) -> Self {
        match response {
            Response::Accept => calsync_core::EventResponse::Accept,
            Response::Tentative => calsync_core::EventResponse::Tentative,
            Response::Decline => calsync_core::EventResponse::Decline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config;

    let load = || App::load(config_path.as_deref());

    match cli.command {
        Commands::Events { calendar, from, to } => {
            let app = load().await?;
            let entities = app.entities(calendar.as_deref())?;
            commands::events::run(&app, entities, from.as_deref(), to.as_deref()).await
        }
        Commands::Now { calendar } => {
            let app = load().await?;
            let entities = app.entities(calendar.as_deref())?;
            commands::now::run(&app, entities).await
        }
        Commands::Watch { calendar } => {
            let app = load().await?;
            let entities = app.entities(calendar.as_deref())?;
            commands::watch::run(&app, entities).await
        }
        Commands::Add {
            subject,
            start,
            end,
            location,
            body,
            rrule,
            calendar,
        } => {
            let app = load().await?;
            let entity = app.entity(calendar.as_deref())?;
            let event = args::new_event(
                subject,
                &start,
                end.as_deref(),
                location,
                body,
                rrule,
                app.time_zone(),
            )?;
            commands::add::run(&app, &entity, event).await
        }
        Commands::Patch {
            event_id,
            subject,
            start,
            end,
            location,
            series,
            calendar,
        } => {
            let app = load().await?;
            let entity = app.entity(calendar.as_deref())?;
            let patch = args::event_patch(
                subject,
                start.as_deref(),
                end.as_deref(),
                location,
                app.time_zone(),
            )?;
            commands::patch::run(&app, &entity, event_id, series, patch).await
        }
        Commands::Delete {
            event_id,
            series,
            calendar,
        } => {
            let app = load().await?;
            let entity = app.entity(calendar.as_deref())?;
            commands::delete::run(&app, &entity, event_id, series).await
        }
        Commands::Respond {
            event_id,
            response,
            message,
            quiet,
            calendar,
        } => {
            let app = load().await?;
            let entity = app.entity(calendar.as_deref())?;
            commands::respond::run(&app, &entity, event_id, response.into(), !quiet, message)
                .await
        }
        Commands::Reset => commands::reset::run(config_path.as_deref()).await,
    }
}

/// Log to stderr, filtered by `CALSYNC_LOG` (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CALSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
