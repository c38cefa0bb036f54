//! Per-calendar and per-entity settings.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::check_bound;
use crate::constants::{
    DEFAULT_HOURS_BACKWARD_TO_GET, DEFAULT_HOURS_FORWARD_TO_GET, MAX_HOURS_TO_GET,
};
use crate::error::{CalSyncError, CalSyncResult};
use crate::event::Sensitivity;
use crate::sync::SourceFilter;

/// One remote calendar and the entities that track it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub cal_id: String,
    /// Provider name, resolved to a `calsync-provider-<name>` binary.
    pub provider: String,
    /// Overrides the editability reported by the remote.
    #[serde(default)]
    pub can_edit: Option<bool>,
    /// Treat as a group calendar even if the remote does not say so.
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    /// Provider-specific params (account, tenant, ...), passed through verbatim.
    #[serde(flatten)]
    pub params: HashMap<String, toml::Value>,
}

impl CalendarConfig {
    /// Params sent with every provider call, including the calendar id.
    pub fn remote_config(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect();
        map.insert(
            "calendar_id".to_string(),
            serde_json::Value::String(self.cal_id.clone()),
        );
        map
    }
}

fn default_true() -> bool {
    true
}

fn default_hours_backward() -> i64 {
    DEFAULT_HOURS_BACKWARD_TO_GET
}

fn default_hours_forward() -> i64 {
    DEFAULT_HOURS_FORWARD_TO_GET
}

/// Settings for one calendar entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub device_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub track: bool,
    /// Subjects matching any of these regexes are hidden.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Only keep events whose subject contains this text.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sensitivity_exclude: Vec<Sensitivity>,
    /// Cap on the upcoming-events data attribute.
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default = "default_hours_backward")]
    pub hours_backward_to_get: i64,
    #[serde(default = "default_hours_forward")]
    pub hours_forward_to_get: i64,
}

impl EntityConfig {
    pub fn new(device_id: &str, name: &str) -> Self {
        EntityConfig {
            device_id: device_id.to_string(),
            name: name.to_string(),
            track: true,
            exclude: Vec::new(),
            search: None,
            sensitivity_exclude: Vec::new(),
            max_results: None,
            hours_backward_to_get: DEFAULT_HOURS_BACKWARD_TO_GET,
            hours_forward_to_get: DEFAULT_HOURS_FORWARD_TO_GET,
        }
    }

    pub fn exclude_patterns(&self) -> CalSyncResult<Vec<Regex>> {
        self.exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    CalSyncError::Config(format!(
                        "Invalid exclude pattern '{}' for '{}': {}",
                        pattern, self.name, e
                    ))
                })
            })
            .collect()
    }

    pub fn source_filter(&self) -> SourceFilter {
        SourceFilter {
            sensitivity_exclude: self.sensitivity_exclude.clone(),
            search: self.search.clone(),
        }
    }

    pub fn validate(&self) -> CalSyncResult<()> {
        if self.name.trim().is_empty() {
            return Err(CalSyncError::Config(format!(
                "Entity '{}' has an empty name",
                self.device_id
            )));
        }
        // Names double as store scopes, which are separated by '/'
        if self.name.contains('/') {
            return Err(CalSyncError::Config(format!(
                "Entity name '{}' must not contain '/'",
                self.name
            )));
        }
        check_bound("hours_backward_to_get", self.hours_backward_to_get, MAX_HOURS_TO_GET)?;
        check_bound("hours_forward_to_get", self.hours_forward_to_get, MAX_HOURS_TO_GET)?;
        if self.hours_backward_to_get > self.hours_forward_to_get {
            return Err(CalSyncError::Config(format!(
                "'{}': hours_backward_to_get ({}) is after hours_forward_to_get ({})",
                self.name, self.hours_backward_to_get, self.hours_forward_to_get
            )));
        }
        self.exclude_patterns().map(|_| ())
    }
}
