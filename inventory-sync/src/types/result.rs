use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DataSourceId, SyncItem};

/// Severity of a synchronization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResultType {
    Success,
    Error,
    Warning,
    Information,
}

impl fmt::Display for SyncResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResultType::Success => f.write_str("success"),
            SyncResultType::Error => f.write_str("error"),
            SyncResultType::Warning => f.write_str("warning"),
            SyncResultType::Information => f.write_str("information"),
        }
    }
}

/// Difference of one attribute between the inventory and the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub attribute: String,
    /// Value currently stored in the inventory.
    pub current: Option<String>,
    /// Value reported by the external system.
    pub proposed: Option<String>,
}

/// What a synchronization result is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncResultKind {
    /// The external object is missing from the inventory.
    Create { item: SyncItem },
    /// The object exists in both places with different attributes.
    Update {
        class_name: String,
        changes: Vec<AttributeChange>,
    },
    /// The inventory object is no longer reported by the external system.
    Delete { class_name: String },
    /// The objects cannot be reconciled automatically.
    Conflict { reason: String },
    /// The provider could not fetch an item.
    FetchFailure { message: String },
}

impl SyncResultKind {
    /// Returns `true` for kinds that translate into an inventory change.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            SyncResultKind::Create { .. }
                | SyncResultKind::Update { .. }
                | SyncResultKind::Delete { .. }
        )
    }
}

/// One proposed or applied inventory change produced by the analyze phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    data_source_id: DataSourceId,
    item_key: Option<String>,
    kind: SyncResultKind,
    result_type: SyncResultType,
    description: String,
    applied: bool,
}

impl SyncResult {
    pub fn new(
        data_source_id: DataSourceId,
        item_key: Option<String>,
        kind: SyncResultKind,
        result_type: SyncResultType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            data_source_id,
            item_key,
            kind,
            result_type,
            description: description.into(),
            applied: false,
        }
    }

    /// Marks the result as applied to the inventory.
    pub(crate) fn into_applied(mut self) -> Self {
        self.applied = true;
        self.result_type = SyncResultType::Success;
        self
    }

    /// Marks the result as a failed application attempt.
    pub(crate) fn into_failed(mut self, reason: impl fmt::Display) -> Self {
        self.result_type = SyncResultType::Error;
        self.description = format!("{} (not applied: {reason})", self.description);
        self
    }

    pub fn data_source_id(&self) -> DataSourceId {
        self.data_source_id
    }

    pub fn item_key(&self) -> Option<&str> {
        self.item_key.as_deref()
    }

    pub fn kind(&self) -> &SyncResultKind {
        &self.kind
    }

    pub fn result_type(&self) -> SyncResultType {
        self.result_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn applied(&self) -> bool {
        self.applied
    }
}
