use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::SyncJobResult;
use crate::types::{DataSourceId, SyncItem};

/// A change to apply to the inventory objects of one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InventoryChange {
    Create(SyncItem),
    /// Replaces the attributes of an existing object.
    Update {
        key: String,
        attributes: BTreeMap<String, String>,
    },
    Delete {
        key: String,
    },
}

impl InventoryChange {
    /// Returns the key of the object the change targets.
    pub fn key(&self) -> &str {
        match self {
            InventoryChange::Create(item) => &item.key,
            InventoryChange::Update { key, .. } | InventoryChange::Delete { key } => key,
        }
    }
}

/// Trait for stores holding the current inventory.
///
/// The analyze phase reads the objects attributed to each data source and, in automated runs,
/// writes the resulting changes back. Implementations must be safe to share across tasks.
pub trait Inventory {
    /// Returns the objects currently attributed to `data_source_id`.
    fn objects(
        &self,
        data_source_id: DataSourceId,
    ) -> impl Future<Output = SyncJobResult<Vec<SyncItem>>> + Send;

    /// Applies a single change to the objects of `data_source_id`.
    fn apply(
        &self,
        data_source_id: DataSourceId,
        change: &InventoryChange,
    ) -> impl Future<Output = SyncJobResult<()>> + Send;
}
