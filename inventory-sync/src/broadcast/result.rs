use std::sync::Arc;

use serde::Serialize;

use crate::broadcast::{BroadcastContext, Broadcaster};
use crate::types::SyncResult;

/// Message distributed by the [`ResultBroadcaster`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ResultNotification {
    /// The ordered results of a finished run.
    Results(Arc<Vec<SyncResult>>),
    /// A human-readable status message.
    Text(String),
}

/// Broadcaster distributing synchronization results and status messages.
pub type ResultBroadcaster = Broadcaster<ResultNotification>;

impl Broadcaster<ResultNotification> {
    /// Broadcasts the results of a run. Listeners share one copy of the list.
    pub fn publish_results(&self, results: Arc<Vec<SyncResult>>, context: BroadcastContext) {
        self.broadcast(ResultNotification::Results(results), context);
    }

    /// Broadcasts a status message.
    pub fn publish_text(&self, text: impl Into<String>, context: BroadcastContext) {
        self.broadcast(ResultNotification::Text(text.into()), context);
    }
}
