//! Inventory synchronization core.
//!
//! A synchronization run polls a set of external data sources concurrently through a
//! [`provider::SyncProvider`], merges what they returned into one [`types::PollResult`] and
//! compares it against an [`inventory::Inventory`], producing an ordered list of
//! [`types::SyncResult`]s. Progress and results are published to in-process listeners through
//! [`broadcast::Broadcaster`]s. [`orchestrator::SyncOrchestrator`] ties these together.

pub mod broadcast;
pub mod error;
pub mod inventory;
pub mod jobs;
mod macros;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod types;
