use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ErrorKind, SyncJobResult};
use crate::provider::SyncProvider;
use crate::types::{DataSourceConfiguration, ItemFailure, PollResult, SyncItem};
use crate::{bail, sync_error};

/// Configuration property holding the path of the exported JSON document.
pub const PATH_PROPERTY: &str = "path";

/// Provider reading a JSON export of an external system from disk.
///
/// The document must be a JSON array of objects shaped like [`SyncItem`]. Elements that do not
/// match are reported as per-item failures, keyed by their `key` field when they have one.
#[derive(Debug, Clone, Default)]
pub struct FileProvider;

impl FileProvider {
    pub fn new() -> Self {
        Self
    }

    fn source_path(config: &DataSourceConfiguration) -> SyncJobResult<PathBuf> {
        match config.property(PATH_PROPERTY) {
            Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
            _ => bail!(
                ErrorKind::ConfigError,
                "Data source has no file path",
                detail = format!(
                    "data source {} ({}) is missing the '{PATH_PROPERTY}' property",
                    config.id(),
                    config.name()
                )
            ),
        }
    }
}

impl SyncProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn poll(&self, config: &DataSourceConfiguration) -> SyncJobResult<PollResult> {
        let path = Self::source_path(config)?;

        let contents = tokio::fs::read(&path).await.map_err(|err| {
            sync_error!(
                ErrorKind::SourceIoError,
                "Failed to read data source file",
                detail = format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        let document: Value = serde_json::from_slice(&contents).map_err(|err| {
            sync_error!(
                ErrorKind::DeserializationError,
                "Data source file is not valid JSON",
                detail = format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        let Value::Array(elements) = document else {
            bail!(
                ErrorKind::DeserializationError,
                "Data source file must contain a JSON array",
                path.display()
            );
        };

        let mut items = Vec::with_capacity(elements.len());
        let mut failures = Vec::new();

        for (index, element) in elements.into_iter().enumerate() {
            let key = element
                .get("key")
                .and_then(Value::as_str)
                .map(str::to_owned);

            match serde_json::from_value::<SyncItem>(element) {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(
                        data_source_id = %config.id(),
                        index,
                        error = %err,
                        "skipping malformed element in data source file"
                    );
                    failures.push(ItemFailure::new(key, format!("element {index}: {err}")));
                }
            }
        }

        debug!(
            data_source_id = %config.id(),
            path = %path.display(),
            items = items.len(),
            failures = failures.len(),
            "read data source file"
        );

        Ok(PollResult::for_source(config.id(), items, failures))
    }
}
