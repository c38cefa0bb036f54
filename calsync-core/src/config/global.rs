//! Global calsync configuration at `~/.config/calsync/config.toml`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::{CalendarConfig, check_bound};
use crate::constants::{
    DEFAULT_SYNC_EVENT_MAX_TIME_DAYS, DEFAULT_SYNC_EVENT_MIN_TIME_DAYS,
    DEFAULT_UPDATE_INTERVAL_SECS, MAX_SYNC_WINDOW_DAYS,
};
use crate::error::{CalSyncError, CalSyncResult};

/// Where synced timelines are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Local,
    Memory,
}

fn default_update_interval() -> String {
    format!("{DEFAULT_UPDATE_INTERVAL_SECS}s")
}

fn default_sync_min_time_days() -> i64 {
    DEFAULT_SYNC_EVENT_MIN_TIME_DAYS
}

fn default_sync_max_time_days() -> i64 {
    DEFAULT_SYNC_EVENT_MAX_TIME_DAYS
}

fn default_entry_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalSyncConfig {
    /// Poll interval as a humantime string, e.g. "5m" or "90s".
    #[serde(default = "default_update_interval")]
    pub update_interval: String,

    #[serde(default = "default_sync_min_time_days")]
    pub sync_min_time_days: i64,

    #[serde(default = "default_sync_max_time_days")]
    pub sync_max_time_days: i64,

    /// Allow create/modify/delete/respond.
    #[serde(default)]
    pub enable_update: bool,

    /// IANA zone used for all-day events. Detected by the caller when unset.
    #[serde(default)]
    pub time_zone: Option<String>,

    #[serde(default)]
    pub store: StoreKind,

    #[serde(default)]
    pub store_path: Option<String>,

    /// Namespace of this configuration inside the store.
    #[serde(default = "default_entry_id")]
    pub entry_id: String,

    /// Scopes granted to the account (e.g. "Calendars.ReadWrite").
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Set when the account acts on someone else's mailbox.
    #[serde(default)]
    pub shared_mailbox: Option<String>,

    #[serde(default)]
    pub calendars: Vec<CalendarConfig>,
}

impl Default for CalSyncConfig {
    fn default() -> Self {
        CalSyncConfig {
            update_interval: default_update_interval(),
            sync_min_time_days: DEFAULT_SYNC_EVENT_MIN_TIME_DAYS,
            sync_max_time_days: DEFAULT_SYNC_EVENT_MAX_TIME_DAYS,
            enable_update: false,
            time_zone: None,
            store: StoreKind::default(),
            store_path: None,
            entry_id: default_entry_id(),
            permissions: Vec::new(),
            shared_mailbox: None,
            calendars: Vec::new(),
        }
    }
}

/// Timing settings handed to each coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub update_interval: Duration,
    /// Offset from now to the start of the synchronized window (negative).
    pub sync_min_time: chrono::Duration,
    /// Offset from now to the end of the synchronized window.
    pub sync_max_time: chrono::Duration,
    pub time_zone: Tz,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            sync_min_time: chrono::Duration::days(DEFAULT_SYNC_EVENT_MIN_TIME_DAYS),
            sync_max_time: chrono::Duration::days(DEFAULT_SYNC_EVENT_MAX_TIME_DAYS),
            time_zone: Tz::UTC,
        }
    }
}

impl CalSyncConfig {
    pub fn config_path() -> CalSyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine config directory".into()))?
            .join("calsync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> CalSyncResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> CalSyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CalSyncResult<Self> {
        let config: CalSyncConfig =
            toml::from_str(content).map_err(|e| CalSyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CalSyncResult<()> {
        let interval = self.update_interval()?;
        if interval.is_zero() {
            return Err(CalSyncError::Config("update_interval must be positive".into()));
        }
        self.check_window()?;
        if self.sync_min_time_days > self.sync_max_time_days {
            return Err(CalSyncError::Config(format!(
                "sync_min_time_days ({}) is after sync_max_time_days ({})",
                self.sync_min_time_days, self.sync_max_time_days
            )));
        }
        if let Some(tz) = &self.time_zone {
            parse_time_zone(tz)?;
        }

        let mut names = HashSet::new();
        for calendar in &self.calendars {
            for entity in &calendar.entities {
                entity.validate()?;
                if !names.insert(entity.name.as_str()) {
                    return Err(CalSyncError::Config(format!(
                        "Duplicate entity name '{}'",
                        entity.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn update_interval(&self) -> CalSyncResult<Duration> {
        humantime::parse_duration(&self.update_interval).map_err(|e| {
            CalSyncError::Config(format!(
                "Invalid update_interval '{}': {}",
                self.update_interval, e
            ))
        })
    }

    /// Configured zone, or `fallback` when none is set.
    pub fn time_zone_or(&self, fallback: Tz) -> CalSyncResult<Tz> {
        match &self.time_zone {
            Some(name) => parse_time_zone(name),
            None => Ok(fallback),
        }
    }

    fn check_window(&self) -> CalSyncResult<()> {
        check_bound("sync_min_time_days", self.sync_min_time_days, MAX_SYNC_WINDOW_DAYS)?;
        check_bound("sync_max_time_days", self.sync_max_time_days, MAX_SYNC_WINDOW_DAYS)
    }

    pub fn sync_settings(&self, fallback_tz: Tz) -> CalSyncResult<SyncSettings> {
        self.check_window()?;
        Ok(SyncSettings {
            update_interval: self.update_interval()?,
            sync_min_time: chrono::Duration::days(self.sync_min_time_days),
            sync_max_time: chrono::Duration::days(self.sync_max_time_days),
            time_zone: self.time_zone_or(fallback_tz)?,
        })
    }

    /// Store file location, with `~` expanded.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

fn parse_time_zone(name: &str) -> CalSyncResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| CalSyncError::Config(format!("Unknown time zone '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Sensitivity;

    const SAMPLE: &str = r#"
update_interval = "90s"
enable_update = true
time_zone = "Europe/London"
permissions = ["Calendars.ReadWrite"]

[[calendars]]
cal_id = "AAMkAD"
provider = "outlook"
outlook_account = "me@example.com"

[[calendars.entities]]
device_id = "work"
name = "Work"
exclude = ["^Private.*"]
sensitivity_exclude = ["private"]
hours_forward_to_get = 48
"#;

    #[test]
    fn test_parse_sample() {
        let config = CalSyncConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.update_interval().unwrap(), Duration::from_secs(90));
        assert_eq!(config.sync_min_time_days, -15);
        assert_eq!(config.store, StoreKind::Local);

        let calendar = &config.calendars[0];
        assert_eq!(calendar.provider, "outlook");
        let remote = calendar.remote_config();
        assert_eq!(remote["outlook_account"], "me@example.com");
        assert_eq!(remote["calendar_id"], "AAMkAD");

        let entity = &calendar.entities[0];
        assert!(entity.track);
        assert_eq!(entity.hours_backward_to_get, 0);
        assert_eq!(entity.hours_forward_to_get, 48);
        assert_eq!(entity.sensitivity_exclude, vec![Sensitivity::Private]);

        let settings = config.sync_settings(Tz::UTC).unwrap();
        assert_eq!(settings.time_zone, chrono_tz::Europe::London);
        assert_eq!(settings.sync_max_time, chrono::Duration::days(90));
    }

    #[test]
    fn test_rejects_bad_exclude_pattern() {
        let toml = SAMPLE.replace("^Private.*", "(unclosed");
        assert!(matches!(
            CalSyncConfig::from_toml_str(&toml),
            Err(CalSyncError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_hours() {
        let toml = SAMPLE.replace("hours_forward_to_get = 48", "hours_backward_to_get = 5\nhours_forward_to_get = 1");
        assert!(CalSyncConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_windows() {
        let toml = format!("sync_max_time_days = 9000000000000000\n{SAMPLE}");
        assert!(matches!(
            CalSyncConfig::from_toml_str(&toml),
            Err(CalSyncError::Config(_))
        ));

        let config = CalSyncConfig {
            sync_min_time_days: i64::MIN,
            ..CalSyncConfig::default()
        };
        assert!(config.sync_settings(Tz::UTC).is_err());

        let toml = SAMPLE.replace("hours_forward_to_get = 48", "hours_forward_to_get = 9000000000000000");
        assert!(CalSyncConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_rejects_slash_in_entity_name() {
        let toml = SAMPLE.replace("name = \"Work\"", "name = \"Work/x\"");
        assert!(matches!(
            CalSyncConfig::from_toml_str(&toml),
            Err(CalSyncError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_time_zone() {
        let toml = SAMPLE.replace("Europe/London", "Mars/Olympus");
        assert!(CalSyncConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalSyncConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.calendars.is_empty());
        assert_eq!(
            config.update_interval().unwrap(),
            Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS)
        );
    }
}
