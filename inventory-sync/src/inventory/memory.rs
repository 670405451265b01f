use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ErrorKind, SyncJobResult};
use crate::inventory::{Inventory, InventoryChange};
use crate::types::{DataSourceId, SyncItem};
use crate::{bail, sync_error};

#[derive(Debug, Default)]
struct Inner {
    /// Objects per data source, ordered by key.
    objects: BTreeMap<DataSourceId, BTreeMap<String, SyncItem>>,
    unreadable: HashSet<DataSourceId>,
    read_only: HashSet<DataSourceId>,
}

/// In-memory inventory for tests, development and file-based runs.
///
/// Objects are kept per data source and returned in key order. The inventory can be told to
/// fail reads or writes for given data sources to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryInventory {
    /// Creates a new empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory holding `objects` for each data source.
    pub fn with_objects(objects: BTreeMap<DataSourceId, Vec<SyncItem>>) -> Self {
        let objects = objects
            .into_iter()
            .map(|(data_source_id, items)| {
                let by_key = items
                    .into_iter()
                    .map(|item| (item.key.clone(), item))
                    .collect();
                (data_source_id, by_key)
            })
            .collect();

        Self {
            inner: Arc::new(Mutex::new(Inner {
                objects,
                ..Inner::default()
            })),
        }
    }

    /// Loads an inventory snapshot from a JSON file.
    ///
    /// The document maps data source ids to arrays of objects, for example
    /// `{"1": [{"key": "router-1", "class_name": "Router"}]}`.
    pub async fn load_json(path: impl AsRef<Path>) -> SyncJobResult<Self> {
        let path = path.as_ref();

        let contents = tokio::fs::read(path).await.map_err(|err| {
            sync_error!(
                ErrorKind::InventoryReadFailed,
                "Failed to read inventory snapshot",
                detail = format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        let objects: BTreeMap<DataSourceId, Vec<SyncItem>> = serde_json::from_slice(&contents)
            .map_err(|err| {
                sync_error!(
                    ErrorKind::DeserializationError,
                    "Inventory snapshot is malformed",
                    detail = format!("{}: {err}", path.display()),
                    source: err
                )
            })?;

        for (data_source_id, items) in &objects {
            let mut keys = HashSet::with_capacity(items.len());
            if let Some(duplicate) = items.iter().find(|item| !keys.insert(item.key.as_str())) {
                bail!(
                    ErrorKind::InvalidData,
                    "Inventory snapshot holds a key more than once",
                    format!(
                        "{}: data source {data_source_id} lists '{}' twice",
                        path.display(),
                        duplicate.key
                    )
                );
            }
        }

        info!(
            path = %path.display(),
            data_sources = objects.len(),
            "loaded inventory snapshot"
        );

        Ok(Self::with_objects(objects))
    }

    /// Writes the current objects to `path` in the format read by [`MemoryInventory::load_json`].
    pub async fn save_json(&self, path: impl AsRef<Path>) -> SyncJobResult<()> {
        let path = path.as_ref();
        let snapshot = self.objects_snapshot().await;

        let contents = serde_json::to_vec_pretty(&snapshot).map_err(|err| {
            sync_error!(
                ErrorKind::SerializationError,
                "Failed to serialize inventory snapshot",
                detail = err.to_string(),
                source: err
            )
        })?;

        tokio::fs::write(path, contents).await.map_err(|err| {
            sync_error!(
                ErrorKind::InventoryWriteFailed,
                "Failed to write inventory snapshot",
                detail = format!("{}: {err}", path.display()),
                source: err
            )
        })?;

        info!(
            path = %path.display(),
            data_sources = snapshot.len(),
            "saved inventory snapshot"
        );

        Ok(())
    }

    /// Returns a copy of all objects, in key order per data source.
    pub async fn objects_snapshot(&self) -> BTreeMap<DataSourceId, Vec<SyncItem>> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .iter()
            .map(|(data_source_id, by_key)| (*data_source_id, by_key.values().cloned().collect()))
            .collect()
    }

    /// Makes reads for `data_source_id` fail.
    pub async fn fail_reads(&self, data_source_id: DataSourceId) {
        let mut inner = self.inner.lock().await;
        inner.unreadable.insert(data_source_id);
    }

    /// Makes writes for `data_source_id` fail.
    pub async fn fail_writes(&self, data_source_id: DataSourceId) {
        let mut inner = self.inner.lock().await;
        inner.read_only.insert(data_source_id);
    }
}

impl Inventory for MemoryInventory {
    async fn objects(&self, data_source_id: DataSourceId) -> SyncJobResult<Vec<SyncItem>> {
        let inner = self.inner.lock().await;

        if inner.unreadable.contains(&data_source_id) {
            bail!(
                ErrorKind::InventoryReadFailed,
                "Inventory is unavailable for data source",
                data_source_id
            );
        }

        Ok(inner
            .objects
            .get(&data_source_id)
            .map(|by_key| by_key.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply(
        &self,
        data_source_id: DataSourceId,
        change: &InventoryChange,
    ) -> SyncJobResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.read_only.contains(&data_source_id) {
            bail!(
                ErrorKind::InventoryWriteFailed,
                "Inventory rejected the change",
                format!("data source {data_source_id} is read only")
            );
        }

        let objects = inner.objects.entry(data_source_id).or_default();

        match change {
            InventoryChange::Create(item) => {
                if objects.contains_key(&item.key) {
                    bail!(
                        ErrorKind::InvalidState,
                        "Inventory object already exists",
                        format!("key {} in data source {data_source_id}", item.key)
                    );
                }
                objects.insert(item.key.clone(), item.clone());
            }
            InventoryChange::Update { key, attributes } => {
                let Some(object) = objects.get_mut(key) else {
                    bail!(
                        ErrorKind::InvalidState,
                        "Inventory object does not exist",
                        format!("key {key} in data source {data_source_id}")
                    );
                };
                object.attributes = attributes.clone();
            }
            InventoryChange::Delete { key } => {
                if objects.remove(key).is_none() {
                    bail!(
                        ErrorKind::InvalidState,
                        "Inventory object does not exist",
                        format!("key {key} in data source {data_source_id}")
                    );
                }
            }
        }

        debug!(%data_source_id, key = change.key(), "applied inventory change");

        Ok(())
    }
}
