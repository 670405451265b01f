use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an external data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceId(pub u64);

impl DataSourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DataSourceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Describes one external data source to poll.
///
/// The core never interprets `properties`; they are read by the [`crate::provider::SyncProvider`]
/// that polls the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfiguration {
    id: DataSourceId,
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl DataSourceConfiguration {
    /// Creates a configuration without provider properties.
    pub fn new(id: impl Into<DataSourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Returns a copy of the configuration with an extra provider property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> DataSourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the provider property stored under `key`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}
