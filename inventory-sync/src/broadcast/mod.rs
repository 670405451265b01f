//! In-process publish/subscribe for progress and results.
//!
//! Broadcasters are created explicitly by the embedding application and handed to the
//! [`crate::orchestrator::SyncOrchestrator`]; there are no global instances.

mod base;
mod result;

pub use base::{BroadcastContext, Broadcaster, ListenerRegistration};
pub use result::{ResultBroadcaster, ResultNotification};

use crate::types::JobProgressMessage;

/// Broadcaster distributing [`JobProgressMessage`]s of fetch and analyze jobs.
pub type ProgressBroadcaster = Broadcaster<JobProgressMessage>;
