use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw object, either fetched from an external system or held in the inventory.
///
/// `key` identifies the object within one data source and is what the analysis compares on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    pub key: String,
    pub class_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl SyncItem {
    pub fn new(key: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            class_name: class_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns a copy of the item with an attribute set.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A failure captured by a provider for a single item of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Key of the item that failed, when the provider could determine it.
    pub item_key: Option<String>,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item_key: Option<String>, message: impl Into<String>) -> Self {
        Self {
            item_key,
            message: message.into(),
        }
    }

    /// Creates a failure tied to a specific item.
    pub fn for_item(item_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(item_key.into()), message)
    }
}
