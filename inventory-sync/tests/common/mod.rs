#![allow(dead_code)]

pub mod notify;
pub mod recorder;

use config::shared::SyncConfig;
use inventory_sync::broadcast::{ProgressBroadcaster, ResultBroadcaster};
use inventory_sync::inventory::memory::MemoryInventory;
use inventory_sync::orchestrator::SyncOrchestrator;
use inventory_sync::types::{DataSourceConfiguration, DataSourceId, SyncItem};

/// Creates an orchestrator with fresh broadcasters.
pub fn orchestrator(
    config: SyncConfig,
    inventory: MemoryInventory,
) -> SyncOrchestrator<MemoryInventory> {
    SyncOrchestrator::new(
        config,
        inventory,
        ProgressBroadcaster::new("progress"),
        ResultBroadcaster::new("results"),
    )
    .unwrap()
}

/// Creates one configuration per id, named after the id.
pub fn data_sources(ids: impl IntoIterator<Item = u64>) -> Vec<DataSourceConfiguration> {
    ids.into_iter()
        .map(|id| DataSourceConfiguration::new(DataSourceId(id), format!("source-{id}")))
        .collect()
}

/// Creates `count` items with keys `{prefix}-0`, `{prefix}-1`, ...
pub fn items(prefix: &str, count: usize) -> Vec<SyncItem> {
    (0..count)
        .map(|index| {
            SyncItem::new(format!("{prefix}-{index}"), "NetworkDevice")
                .with_attribute("serial", format!("SN{index:04}"))
        })
        .collect()
}
