use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::{SyncConfig, ValidationError};

/// A data source polled by the runner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DataSourceConfig {
    /// Unique identifier of the data source.
    pub id: u64,
    /// Human readable name, used in logs and results.
    pub name: String,
    /// Path of the JSON snapshot exported by the external system.
    pub path: PathBuf,
}

/// Top level configuration of the `sync-runner` binary.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Synchronization settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Data sources polled during the run.
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    /// Optional JSON snapshot the inventory is seeded from.
    ///
    /// Automated runs write the updated inventory back to the same file.
    #[serde(default)]
    pub inventory_path: Option<PathBuf>,
    /// Optional file the Prometheus metrics of the run are written to.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

impl RunnerConfig {
    /// Validates the runner configuration and the embedded [`SyncConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sync.validate()?;

        let mut seen = HashSet::with_capacity(self.data_sources.len());
        for data_source in &self.data_sources {
            if data_source.name.trim().is_empty() {
                return Err(ValidationError::EmptyDataSourceName(data_source.id));
            }

            if !seen.insert(data_source.id) {
                return Err(ValidationError::DuplicateDataSourceId(data_source.id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_source(id: u64, name: &str) -> DataSourceConfig {
        DataSourceConfig {
            id,
            name: name.to_string(),
            path: PathBuf::from(format!("/tmp/{name}.json")),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = RunnerConfig {
            sync: SyncConfig::default(),
            data_sources: vec![data_source(1, "routers"), data_source(1, "switches")],
            inventory_path: None,
            metrics_path: None,
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateDataSourceId(1))
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let config = RunnerConfig {
            sync: SyncConfig::default(),
            data_sources: vec![data_source(7, "  ")],
            inventory_path: None,
            metrics_path: None,
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyDataSourceName(7))
        );
    }

    #[test]
    fn sync_settings_are_validated() {
        let config = RunnerConfig {
            sync: SyncConfig {
                max_concurrent_fetches: 0,
                ..SyncConfig::default()
            },
            data_sources: vec![],
            inventory_path: None,
            metrics_path: None,
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::MaxConcurrentFetchesZero)
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: RunnerConfig = serde_json::from_str(
            r#"{"data_sources": [{"id": 3, "name": "olt", "path": "olt.json"}]}"#,
        )
        .unwrap();

        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.data_sources.len(), 1);
        assert_eq!(config.inventory_path, None);
        assert_eq!(config.metrics_path, None);
        assert!(config.validate().is_ok());
    }
}
