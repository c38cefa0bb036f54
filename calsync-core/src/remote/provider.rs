//! Provider subprocess transport.
//!
//! Remote calendars are reached through external provider binaries
//! (`calsync-provider-<name>`) speaking JSON over stdin/stdout. Any executable
//! that implements the protocol can be a provider; providers manage their own
//! credentials. Core passes the calendar's provider params with every call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::config::CalendarConfig;
use crate::date_range::DateRange;
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::{Event, EventPatch, EventResponse, NewEvent};
use crate::remote::protocol::{
    Command, CreateEvent, DeleteEvent, GetCalendar, GetEvent, ListEvents, PatchEvent,
    ProviderCommand, Request, RespondEvent, Response, SyncEvents,
};
use crate::remote::{CalendarInfo, EventDelta, RemoteFactory, RemoteSource};
use crate::sync::SyncCursor;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn binary_path(&self) -> CalSyncResult<PathBuf> {
        let binary_name = format!("calsync-provider-{}", self.0);
        which::which(&binary_name).map_err(|_| {
            CalSyncError::RemoteUnavailable(format!(
                "Provider '{}' not found in PATH (looked for {})",
                self.0, binary_name
            ))
        })
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> CalSyncResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                CalSyncError::RemoteUnavailable(format!(
                    "Provider request timed out after {}s",
                    PROVIDER_TIMEOUT.as_secs()
                ))
            })?
    }

    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> CalSyncResult<R> {
        let params = serde_json::to_value(params)?;
        let request_json = serde_json::to_string(&Request { command, params })?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.0, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalSyncError::RemoteUnavailable(format!(
                    "Failed to spawn {}: {}",
                    binary_path.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CalSyncError::RemoteUnavailable("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(transport)?;
        drop(stdin);

        let output = child.wait_with_output().await.map_err(transport)?;

        if !output.status.success() {
            return Err(CalSyncError::RemoteUnavailable(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(CalSyncError::RemoteUnavailable(
                "Provider returned no response".into(),
            ));
        }

        let response: Response<R> = serde_json::from_str(&response_str).map_err(|e| {
            CalSyncError::RemoteUnavailable(format!("Failed to parse provider response: {e}"))
        })?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(CalSyncError::RemoteUnavailable(error)),
        }
    }
}

fn transport(e: std::io::Error) -> CalSyncError {
    CalSyncError::RemoteUnavailable(format!("Provider I/O failed: {e}"))
}

/// A calendar reached through a provider binary.
pub struct ProviderRemote {
    provider: Provider,
    remote_config: serde_json::Map<String, serde_json::Value>,
    info: CalendarInfo,
}

impl ProviderRemote {
    /// Open a calendar: asks the provider for its metadata, which doubles as
    /// an access check.
    pub async fn connect(config: &CalendarConfig) -> CalSyncResult<Self> {
        let provider = Provider::from_name(&config.provider);
        let remote_config = config.remote_config();
        let info = provider
            .call(GetCalendar {
                remote_config: remote_config.clone(),
            })
            .await?;
        Ok(ProviderRemote {
            provider,
            remote_config,
            info,
        })
    }

    fn params(&self) -> serde_json::Map<String, serde_json::Value> {
        self.remote_config.clone()
    }
}

#[async_trait]
impl RemoteSource for ProviderRemote {
    fn info(&self) -> &CalendarInfo {
        &self.info
    }

    async fn list_events(&self, range: &DateRange) -> CalSyncResult<Vec<Event>> {
        self.provider
            .call(ListEvents {
                remote_config: self.params(),
                from: range.from_rfc3339(),
                to: range.to_rfc3339(),
            })
            .await
    }

    async fn sync_events(
        &self,
        window: &DateRange,
        cursor: Option<&SyncCursor>,
    ) -> CalSyncResult<EventDelta> {
        if !self.info.supports_delta {
            let events = self.list_events(window).await?;
            return Ok(EventDelta::snapshot(events));
        }
        self.provider
            .call(SyncEvents {
                remote_config: self.params(),
                from: window.from_rfc3339(),
                to: window.to_rfc3339(),
                token: cursor.and_then(|c| c.token.clone()),
            })
            .await
    }

    async fn get_event(&self, id: &str) -> CalSyncResult<Event> {
        self.provider
            .call(GetEvent {
                remote_config: self.params(),
                event_id: id.to_string(),
            })
            .await
    }

    async fn create_event(&self, event: &NewEvent) -> CalSyncResult<Event> {
        self.provider
            .call(CreateEvent {
                remote_config: self.params(),
                event: event.clone(),
            })
            .await
    }

    async fn patch_event(&self, id: &str, patch: &EventPatch) -> CalSyncResult<Event> {
        self.provider
            .call(PatchEvent {
                remote_config: self.params(),
                event_id: id.to_string(),
                patch: patch.clone(),
            })
            .await
    }

    async fn delete_event(&self, id: &str) -> CalSyncResult<()> {
        self.provider
            .call(DeleteEvent {
                remote_config: self.params(),
                event_id: id.to_string(),
            })
            .await
    }

    async fn respond_event(
        &self,
        id: &str,
        response: EventResponse,
        message: Option<&str>,
        send_response: bool,
    ) -> CalSyncResult<()> {
        self.provider
            .call(RespondEvent {
                remote_config: self.params(),
                event_id: id.to_string(),
                response,
                message: message.map(str::to_string),
                send_response,
            })
            .await
    }
}

/// Opens `ProviderRemote`s for configured calendars.
#[derive(Debug, Default, Clone)]
pub struct ProviderFactory;

#[async_trait]
impl RemoteFactory for ProviderFactory {
    async fn open(&self, calendar: &CalendarConfig) -> CalSyncResult<Arc<dyn RemoteSource>> {
        let remote = ProviderRemote::connect(calendar).await?;
        Ok(Arc::new(remote))
    }
}
