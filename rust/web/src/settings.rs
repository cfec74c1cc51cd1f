use crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service settings, loadable from a JSON file. Missing fields take their
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Thinking budget per side in minutes
    pub time_budget_minutes: u64,
    /// Pause before each retry of a conflicting write, in milliseconds
    pub retry_backoff_ms: Vec<u64>,
    /// Buffer size of each event subscriber channel
    pub event_channel_capacity: usize,
    /// JSONL file receiving one record per finished game
    pub archive_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            time_budget_minutes: 15,
            retry_backoff_ms: vec![100, 300, 900],
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            archive_path: None,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.time_budget_minutes == 0 || self.time_budget_minutes > 24 * 60 {
            return Err(SettingsError::InvalidValue(
                "time_budget_minutes must be between 1 and 1440".to_string(),
            ));
        }

        if self.retry_backoff_ms.len() > 10 {
            return Err(SettingsError::InvalidValue(
                "retry_backoff_ms allows at most 10 retries".to_string(),
            ));
        }

        if self.retry_backoff_ms.iter().any(|ms| *ms > 60_000) {
            return Err(SettingsError::InvalidValue(
                "retry_backoff_ms entries must not exceed 60000".to_string(),
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        let settings: AppSettings =
            serde_json::from_str(raw).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn time_budget_ms(&self) -> i64 {
        (self.time_budget_minutes * 60 * 1000) as i64
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(&self.retry_backoff_ms)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Malformed settings: {0}")]
    Parse(String),
    #[error("Cannot read settings: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotg_engine::game::DEFAULT_TIME_BUDGET_MS;

    #[test]
    fn default_settings_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.time_budget_ms(), DEFAULT_TIME_BUDGET_MS);
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn validates_time_budget_range() {
        let settings = AppSettings {
            time_budget_minutes: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            time_budget_minutes: 1441,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            time_budget_minutes: 1,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validates_backoff_schedule() {
        let settings = AppSettings {
            retry_backoff_ms: vec![10; 11],
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            retry_backoff_ms: vec![120_000],
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            retry_backoff_ms: vec![],
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        assert_eq!(settings.retry_policy().max_attempts(), 1);
    }

    #[test]
    fn validates_channel_capacity() {
        let settings = AppSettings {
            event_channel_capacity: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = AppSettings::from_json_str(r#"{ "time_budget_minutes": 5 }"#).unwrap();
        assert_eq!(settings.time_budget_minutes, 5);
        assert_eq!(settings.retry_backoff_ms, vec![100, 300, 900]);
        assert_eq!(settings.archive_path, None);
    }

    #[test]
    fn rejects_malformed_or_invalid_json() {
        assert!(matches!(
            AppSettings::from_json_str("{ not json"),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            AppSettings::from_json_str(r#"{ "event_channel_capacity": 0 }"#),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("gotg_missing_settings_file.json");
        assert!(matches!(AppSettings::load(&path), Err(SettingsError::Io(_))));
    }
}
