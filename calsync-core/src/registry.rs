//! Entity services registered at setup.
//!
//! The mutation services are only registered when updates are supported, so
//! a read-only setup rejects them before any entity is involved.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::CalendarEntity;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{EventPatch, EventResponse, NewEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityService {
    CreateCalendarEvent,
    ModifyCalendarEvent,
    RemoveCalendarEvent,
    RespondCalendarEvent,
}

impl EntityService {
    pub const ALL: [EntityService; 4] = [
        EntityService::CreateCalendarEvent,
        EntityService::ModifyCalendarEvent,
        EntityService::RemoveCalendarEvent,
        EntityService::RespondCalendarEvent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityService::CreateCalendarEvent => "create_calendar_event",
            EntityService::ModifyCalendarEvent => "modify_calendar_event",
            EntityService::RemoveCalendarEvent => "remove_calendar_event",
            EntityService::RespondCalendarEvent => "respond_calendar_event",
        }
    }
}

impl fmt::Display for EntityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait ServiceRegistry: Send + Sync {
    fn register_entity_service(&mut self, service: EntityService);

    fn is_registered(&self, service: EntityService) -> bool;
}

/// Register the mutation services when `update_supported`.
pub fn register_services(registry: &mut dyn ServiceRegistry, update_supported: bool) {
    if !update_supported {
        return;
    }
    for service in EntityService::ALL {
        registry.register_entity_service(service);
    }
}

/// A request for one entity service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Create(NewEvent),
    Modify {
        event_id: String,
        recurrence_id: Option<String>,
        recurrence_range: Option<String>,
        patch: EventPatch,
    },
    Remove {
        event_id: String,
        recurrence_id: Option<String>,
        recurrence_range: Option<String>,
    },
    Respond {
        event_id: String,
        response: EventResponse,
        send_response: bool,
        message: Option<String>,
    },
}

impl ServiceCall {
    pub fn service(&self) -> EntityService {
        match self {
            ServiceCall::Create(_) => EntityService::CreateCalendarEvent,
            ServiceCall::Modify { .. } => EntityService::ModifyCalendarEvent,
            ServiceCall::Remove { .. } => EntityService::RemoveCalendarEvent,
            ServiceCall::Respond { .. } => EntityService::RespondCalendarEvent,
        }
    }
}

/// In-process registry.
#[derive(Debug, Default, Clone)]
pub struct Services {
    registered: BTreeSet<EntityService>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> impl Iterator<Item = EntityService> + '_ {
        self.registered.iter().copied()
    }

    /// Run `call` against `entity`. Unregistered services are refused.
    pub async fn dispatch(&self, entity: &CalendarEntity, call: ServiceCall) -> CalSyncResult<()> {
        let service = call.service();
        if !self.is_registered(service) {
            return Err(CalSyncError::CalendarNotEditable(entity.name().to_string()));
        }
        debug!(%service, entity = %entity.entity_id(), "dispatching service call");

        match call {
            ServiceCall::Create(event) => {
                entity.async_create_calendar_event(&event).await?;
            }
            ServiceCall::Modify {
                event_id,
                recurrence_id,
                recurrence_range,
                patch,
            } => {
                entity
                    .async_modify_calendar_event(
                        &event_id,
                        recurrence_id.as_deref(),
                        recurrence_range.as_deref(),
                        &patch,
                    )
                    .await?;
            }
            ServiceCall::Remove {
                event_id,
                recurrence_id,
                recurrence_range,
            } => {
                entity
                    .async_remove_calendar_event(
                        &event_id,
                        recurrence_id.as_deref(),
                        recurrence_range.as_deref(),
                    )
                    .await?;
            }
            ServiceCall::Respond {
                event_id,
                response,
                send_response,
                message,
            } => {
                entity
                    .async_respond_calendar_event(&event_id, response, send_response, message.as_deref())
                    .await?;
            }
        }
        Ok(())
    }
}

impl ServiceRegistry for Services {
    fn register_entity_service(&mut self, service: EntityService) {
        self.registered.insert(service);
    }

    fn is_registered(&self, service: EntityService) -> bool {
        self.registered.contains(&service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_only_registered_when_updates_supported() {
        let mut services = Services::new();
        register_services(&mut services, false);
        assert_eq!(services.registered().count(), 0);

        register_services(&mut services, true);
        assert!(services.is_registered(EntityService::RespondCalendarEvent));
        assert_eq!(services.registered().count(), 4);
    }

    #[test]
    fn test_call_maps_to_service() {
        let call = ServiceCall::Remove {
            event_id: "a".into(),
            recurrence_id: None,
            recurrence_range: None,
        };
        assert_eq!(call.service(), EntityService::RemoveCalendarEvent);
        assert_eq!(call.service().to_string(), "remove_calendar_event");
    }
}
