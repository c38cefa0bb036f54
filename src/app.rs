//! Loading configuration and wiring it into entities.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use calsync_core::auth::Permissions;
use calsync_core::bus::BroadcastBus;
use calsync_core::config::{CalSyncConfig, StoreKind};
use calsync_core::remote::ProviderFactory;
use calsync_core::setup::{Setup, async_do_setup};
use calsync_core::store::{InMemoryStore, LocalStore, Store};
use calsync_core::CalendarEntity;
use chrono_tz::Tz;
use tracing::debug;

pub struct App {
    pub setup: Setup,
    pub bus: Arc<BroadcastBus>,
    tz: Tz,
}

impl App {
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = load_config(path)?;
        let tz = config.time_zone_or(local_time_zone())?;
        let settings = config.sync_settings(tz)?;

        let store: Arc<dyn Store> = match config.store {
            StoreKind::Memory => Arc::new(InMemoryStore::new()),
            StoreKind::Local => Arc::new(local_store(&config)?),
        };
        let permissions = Arc::new(Permissions::new(
            config.permissions.iter().cloned(),
            config.shared_mailbox.is_some(),
        ));
        let bus = Arc::new(BroadcastBus::default());

        let setup = async_do_setup(
            &config,
            settings,
            &ProviderFactory,
            permissions,
            store,
            bus.clone(),
        )
        .await?;

        if setup.entities.is_empty() {
            anyhow::bail!(
                "No calendars to show.\n\n\
                Add a calendar with at least one tracked entity to:\n  {}",
                CalSyncConfig::config_path()?.display()
            );
        }

        Ok(App {
            setup,
            bus,
            tz,
        })
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Entities matching `name`, or all of them.
    pub fn entities(&self, name: Option<&str>) -> Result<Vec<Arc<CalendarEntity>>> {
        match name {
            Some(name) => Ok(vec![self.entity(Some(name))?]),
            None => Ok(self.setup.entities.clone()),
        }
    }

    /// The entity named `name`. Without a name there must be exactly one.
    pub fn entity(&self, name: Option<&str>) -> Result<Arc<CalendarEntity>> {
        match name {
            Some(name) => self.setup.entity(name).cloned().ok_or_else(|| {
                anyhow::anyhow!(
                    "Calendar '{}' not found. Available: {}",
                    name,
                    self.names().join(", ")
                )
            }),
            None => match self.setup.entities.as_slice() {
                [only] => Ok(only.clone()),
                _ => anyhow::bail!(
                    "Several calendars configured, pick one with --calendar: {}",
                    self.names().join(", ")
                ),
            },
        }
    }

    fn names(&self) -> Vec<&str> {
        self.setup.entities.iter().map(|e| e.name()).collect()
    }
}

pub fn load_config(path: Option<&Path>) -> Result<CalSyncConfig> {
    let config = match path {
        Some(path) => CalSyncConfig::load_from(path),
        None => CalSyncConfig::load(),
    };
    config.context("Failed to load configuration")
}

pub fn local_store(config: &CalSyncConfig) -> Result<LocalStore> {
    match config.store_path() {
        Some(path) => Ok(LocalStore::new(path)),
        None => Ok(LocalStore::for_entry(&config.entry_id)?),
    }
}

/// The system zone, or UTC when it cannot be determined.
fn local_time_zone() -> Tz {
    match iana_time_zone::get_timezone() {
        Ok(name) => name.parse().unwrap_or_else(|_| {
            debug!(%name, "unknown system time zone, using UTC");
            Tz::UTC
        }),
        Err(e) => {
            debug!(error = %e, "could not detect time zone, using UTC");
            Tz::UTC
        }
    }
}
