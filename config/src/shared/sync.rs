use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Whether a synchronization run only proposes changes or also applies them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Changes are computed and reported, the inventory is left untouched.
    #[default]
    Supervised,
    /// Changes are applied to the inventory while the analysis runs.
    Automated,
}

impl SyncMode {
    /// Returns `true` when the analysis should write changes to the inventory.
    pub fn applies_changes(&self) -> bool {
        matches!(self, SyncMode::Automated)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Supervised => write!(f, "supervised"),
            SyncMode::Automated => write!(f, "automated"),
        }
    }
}

/// Settings for one synchronization run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Maximum number of fetch jobs polling data sources at the same time.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u16,
    /// Upper bound, in milliseconds, for a single data source poll.
    ///
    /// When unset, a poll may run for as long as the provider needs.
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
    /// Whether the analysis applies the changes it finds.
    #[serde(default)]
    pub mode: SyncMode,
    /// Whether the final result list is broadcast before the completion notice.
    #[serde(default = "default_broadcast_results")]
    pub broadcast_results: bool,
}

impl SyncConfig {
    /// Default number of concurrent fetch jobs.
    pub const DEFAULT_MAX_CONCURRENT_FETCHES: u16 = 8;

    /// Validates synchronization settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_fetches == 0 {
            return Err(ValidationError::MaxConcurrentFetchesZero);
        }

        if self.fetch_timeout_ms == Some(0) {
            return Err(ValidationError::FetchTimeoutZero);
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_ms: None,
            mode: SyncMode::default(),
            broadcast_results: default_broadcast_results(),
        }
    }
}

fn default_max_concurrent_fetches() -> u16 {
    SyncConfig::DEFAULT_MAX_CONCURRENT_FETCHES
}

fn default_broadcast_results() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SyncConfig::default();

        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.fetch_timeout_ms, None);
        assert_eq!(config.mode, SyncMode::Supervised);
        assert!(config.broadcast_results);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SyncConfig {
            max_concurrent_fetches: 0,
            ..SyncConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::MaxConcurrentFetchesZero)
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = SyncConfig {
            fetch_timeout_ms: Some(0),
            ..SyncConfig::default()
        };

        assert_eq!(config.validate(), Err(ValidationError::FetchTimeoutZero));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"mode": "automated"}"#).unwrap();

        assert_eq!(config.mode, SyncMode::Automated);
        assert!(config.mode.applies_changes());
        assert_eq!(
            config.max_concurrent_fetches,
            SyncConfig::DEFAULT_MAX_CONCURRENT_FETCHES
        );
        assert!(config.broadcast_results);
    }
}
