//! Fire-and-forget notifications for calendar mutations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusEventKind {
    Created,
    Modified,
    ModifiedRecurrences,
    Removed,
    RemovedRecurrences,
    Responded,
}

impl BusEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusEventKind::Created => "create_calendar_event",
            BusEventKind::Modified => "modify_calendar_event",
            BusEventKind::ModifiedRecurrences => "modify_calendar_recurrences",
            BusEventKind::Removed => "remove_calendar_event",
            BusEventKind::RemovedRecurrences => "remove_calendar_recurrences",
            BusEventKind::Responded => "respond_calendar_event",
        }
    }
}

impl fmt::Display for BusEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEvent {
    pub kind: BusEventKind,
    pub event_id: String,
    /// Name of the calendar entity the mutation went through.
    pub calendar: String,
}

pub trait EventBus: Send + Sync {
    /// Publish `event`. Never blocks and never fails.
    fn fire(&self, event: BusEvent);
}

/// `EventBus` on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<BusEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        BroadcastBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        BroadcastBus::new(64)
    }
}

impl EventBus for BroadcastBus {
    fn fire(&self, event: BusEvent) {
        debug!(kind = %event.kind, id = %event.event_id, "bus event");
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = BroadcastBus::default();
        let mut rx = bus.subscribe();

        bus.fire(BusEvent {
            kind: BusEventKind::Removed,
            event_id: "abc".into(),
            calendar: "Work".into(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, BusEventKind::Removed);
        assert_eq!(received.event_id, "abc");
    }

    #[test]
    fn test_fire_without_receivers_is_silent() {
        let bus = BroadcastBus::new(1);
        bus.fire(BusEvent {
            kind: BusEventKind::Created,
            event_id: "x".into(),
            calendar: "Work".into(),
        });
    }
}
