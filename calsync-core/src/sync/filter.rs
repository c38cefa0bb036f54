use serde::{Deserialize, Serialize};

use crate::event::{Event, Sensitivity};

/// Source-side filtering applied to everything fetched from a remote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFilter {
    pub sensitivity_exclude: Vec<Sensitivity>,
    /// Keep only events whose subject contains this text (case-insensitive).
    pub search: Option<String>,
}

impl SourceFilter {
    pub fn accepts(&self, event: &Event) -> bool {
        if self.sensitivity_exclude.contains(&event.sensitivity) {
            return false;
        }
        match &self.search {
            Some(needle) if !needle.is_empty() => event
                .subject
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}
