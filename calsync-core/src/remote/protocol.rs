//! JSON protocol spoken between calsync and provider binaries over stdin/stdout.
//!
//! Each invocation carries exactly one `Request` and expects one `Response`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::event::{Event, EventPatch, EventResponse, NewEvent};
use crate::remote::{CalendarInfo, EventDelta};

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    GetCalendar,
    ListEvents,
    SyncEvents,
    GetEvent,
    CreateEvent,
    PatchEvent,
    DeleteEvent,
    RespondEvent,
}

/// Request sent from calsync to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider to calsync.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Calendar metadata and access check.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetCalendar {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
}

impl ProviderCommand for GetCalendar {
    type Response = CalendarInfo;
    fn command() -> Command {
        Command::GetCalendar
    }
}

/// List events within a time range.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub from: String,
    pub to: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<Event>;
    fn command() -> Command {
        Command::ListEvents
    }
}

/// Changes since `token` within a window. Without a token the provider
/// returns a full listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncEvents {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ProviderCommand for SyncEvents {
    type Response = EventDelta;
    fn command() -> Command {
        Command::SyncEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub event_id: String,
}

impl ProviderCommand for GetEvent {
    type Response = Event;
    fn command() -> Command {
        Command::GetEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub event: NewEvent,
}

impl ProviderCommand for CreateEvent {
    type Response = Event;
    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub event_id: String,
    pub patch: EventPatch,
}

impl ProviderCommand for PatchEvent {
    type Response = Event;
    fn command() -> Command {
        Command::PatchEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub event_id: String,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub event_id: String,
    pub response: EventResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub send_response: bool,
}

impl ProviderCommand for RespondEvent {
    type Response = ();
    fn command() -> Command {
        Command::RespondEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::EventChange;

    #[test]
    fn test_response_tagging() {
        let ok: Response<Vec<Event>> =
            serde_json::from_str(r#"{"status":"success","data":[]}"#).unwrap();
        assert!(matches!(ok, Response::Success { data } if data.is_empty()));

        let err: Response<()> =
            serde_json::from_str(r#"{"status":"error","error":"rate limited"}"#).unwrap();
        assert!(matches!(err, Response::Error { error } if error == "rate limited"));
    }

    #[test]
    fn test_remote_config_is_flattened_into_params() {
        let mut remote_config = serde_json::Map::new();
        remote_config.insert("account".into(), "me@example.com".into());

        let value = serde_json::to_value(DeleteEvent {
            remote_config,
            event_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(value["account"], "me@example.com");
        assert_eq!(value["event_id"], "abc");
    }

    #[test]
    fn test_delta_change_tags() {
        let delta: EventDelta = serde_json::from_str(
            r#"{"changes":[{"type":"delete","id":"x"},
                {"type":"series_range","series_id":"s","from":"2025-01-06T09:00:00Z"}],
                "token":"t2"}"#,
        )
        .unwrap();
        assert!(!delta.full);
        assert_eq!(delta.token.as_deref(), Some("t2"));
        assert!(matches!(&delta.changes[1], EventChange::SeriesRange { replacement, .. } if replacement.is_empty()));
    }
}
