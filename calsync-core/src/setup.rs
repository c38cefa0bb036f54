//! Wiring configured calendars into entities.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AuthorizationChecker, PERM_CALENDARS_READWRITE};
use crate::bus::EventBus;
use crate::config::{CalSyncConfig, SyncSettings};
use crate::coordinator::SyncCoordinator;
use crate::entity::CalendarEntity;
use crate::error::CalSyncResult;
use crate::registry::{Services, register_services};
use crate::remote::{CalendarKind, RemoteFactory};
use crate::store::{LocalStore, ScopedStore, Store};
use crate::sync::SyncManager;

/// Everything built by [`async_do_setup`].
pub struct Setup {
    pub entities: Vec<Arc<CalendarEntity>>,
    pub services: Services,
    pub update_supported: bool,
}

impl Setup {
    pub fn entity(&self, name: &str) -> Option<&Arc<CalendarEntity>> {
        self.entities.iter().find(|e| e.name() == name)
    }
}

/// Build a coordinator and entity for every tracked entity of every calendar.
///
/// Each entity gets its own store scope named after it. Calendars whose
/// remote cannot be opened are skipped with a warning.
pub async fn async_do_setup(
    config: &CalSyncConfig,
    settings: SyncSettings,
    factory: &dyn RemoteFactory,
    permissions: Arc<dyn AuthorizationChecker>,
    store: Arc<dyn Store>,
    bus: Arc<dyn EventBus>,
) -> CalSyncResult<Setup> {
    let update_supported =
        config.enable_update && permissions.validate_authorization(PERM_CALENDARS_READWRITE);

    let mut entities = Vec::new();
    for calendar in &config.calendars {
        let tracked: Vec<_> = calendar.entities.iter().filter(|e| e.track).collect();
        if tracked.is_empty() {
            continue;
        }

        let remote = match factory.open(calendar).await {
            Ok(remote) => remote,
            Err(e) => {
                for entity in &tracked {
                    warn!(
                        name = %entity.name,
                        device = %entity.device_id,
                        error = %e,
                        "No permission for calendar, please remove"
                    );
                }
                continue;
            }
        };

        let can_edit = calendar.can_edit.unwrap_or(remote.info().can_edit);
        let group_calendar = calendar.group || remote.kind() == CalendarKind::Group;

        for entity_config in tracked {
            let scoped: Arc<dyn Store> =
                Arc::new(ScopedStore::new(Arc::clone(&store), entity_config.name.clone()));
            let sync = SyncManager::new(Arc::clone(&remote), scoped, settings)
                .with_filter(entity_config.source_filter());
            let coordinator = SyncCoordinator::new(
                entity_config.name.clone(),
                Arc::new(sync),
                settings,
                Arc::clone(&permissions),
            );
            let entity = CalendarEntity::new(
                Arc::new(coordinator),
                entity_config.clone(),
                update_supported && can_edit,
                group_calendar,
                Arc::clone(&bus),
            )?;
            entities.push(Arc::new(entity));
        }
    }

    let mut services = Services::new();
    register_services(&mut services, update_supported);

    info!(entities = entities.len(), update_supported, "setup complete");
    Ok(Setup {
        entities,
        services,
        update_supported,
    })
}

/// Forget everything stored for a configuration entry.
pub async fn async_remove_entry(store: &LocalStore) -> CalSyncResult<()> {
    store.async_remove().await
}
