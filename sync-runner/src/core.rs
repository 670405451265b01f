use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use config::shared::{DataSourceConfig, RunnerConfig};
use inventory_sync::broadcast::{
    ListenerRegistration, ProgressBroadcaster, ResultBroadcaster, ResultNotification,
};
use inventory_sync::inventory::memory::MemoryInventory;
use inventory_sync::orchestrator::SyncOrchestrator;
use inventory_sync::provider::file::{FileProvider, PATH_PROPERTY};
use inventory_sync::types::{DataSourceConfiguration, DataSourceId, SyncResult};
use telemetry::metrics::init_metrics_handle;
use tracing::{debug, info, warn};

/// Runs a single synchronization described by `runner_config` and prints its results.
pub async fn run_with_config(runner_config: RunnerConfig) -> anyhow::Result<()> {
    let metrics_handle =
        init_metrics_handle().context("failed to install the prometheus recorder")?;
    let metrics_path = runner_config.metrics_path.clone();

    let progress_broadcaster = ProgressBroadcaster::new("progress");
    let result_broadcaster = ResultBroadcaster::new("results");
    let registrations = register_log_listeners(&progress_broadcaster, &result_broadcaster);

    let result = run(runner_config, &progress_broadcaster, &result_broadcaster).await;

    for registration in &registrations {
        registration.unregister();
    }
    progress_broadcaster.shutdown().await;
    result_broadcaster.shutdown().await;

    let rendered = metrics_handle.render();
    match &metrics_path {
        Some(path) => write_metrics(path, &rendered).await?,
        None => debug!(metrics = %rendered, "run metrics"),
    }

    let results = result?;
    let output =
        serde_json::to_string_pretty(&results).context("failed to serialize the results")?;
    println!("{output}");

    Ok(())
}

async fn run(
    runner_config: RunnerConfig,
    progress_broadcaster: &ProgressBroadcaster,
    result_broadcaster: &ResultBroadcaster,
) -> anyhow::Result<Vec<SyncResult>> {
    let inventory = match &runner_config.inventory_path {
        Some(path) => {
            info!(path = %path.display(), "loading inventory snapshot");
            MemoryInventory::load_json(path)
                .await
                .with_context(|| format!("failed to load inventory from {}", path.display()))?
        }
        None => {
            warn!("no inventory snapshot configured, starting from an empty inventory");
            MemoryInventory::new()
        }
    };

    let mode = runner_config.sync.mode;
    let orchestrator = SyncOrchestrator::new(
        runner_config.sync,
        inventory,
        progress_broadcaster.clone(),
        result_broadcaster.clone(),
    )?;

    let configs = runner_config
        .data_sources
        .iter()
        .map(data_source_configuration)
        .collect::<Vec<_>>();

    let results = orchestrator
        .run_synchronization(Arc::new(FileProvider::new()), configs)
        .await?;

    if mode.applies_changes() {
        if let Some(path) = &runner_config.inventory_path {
            orchestrator
                .inventory()
                .save_json(path)
                .await
                .with_context(|| format!("failed to write inventory to {}", path.display()))?;
        }
    }

    Ok(results)
}

async fn write_metrics(path: &Path, rendered: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "wrote run metrics");

    Ok(())
}

fn data_source_configuration(data_source: &DataSourceConfig) -> DataSourceConfiguration {
    DataSourceConfiguration::new(DataSourceId(data_source.id), data_source.name.clone())
        .with_property(PATH_PROPERTY, data_source.path.display().to_string())
}

fn register_log_listeners(
    progress_broadcaster: &ProgressBroadcaster,
    result_broadcaster: &ResultBroadcaster,
) -> Vec<ListenerRegistration> {
    let progress = progress_broadcaster.register(|message, context| {
        debug!(
            run_id = ?context.run_id,
            job_id = %message.job_id(),
            step = %message.step(),
            completed = message.completed(),
            total = message.total(),
            progress = message.progress(),
            "job progress"
        );
    });

    let results = result_broadcaster.register(|notification, context| match notification {
        ResultNotification::Results(results) => {
            let changes = results
                .iter()
                .filter(|result| result.kind().is_change())
                .count();
            info!(
                run_id = ?context.run_id,
                results = results.len(),
                changes,
                "results published"
            );
        }
        ResultNotification::Text(text) => {
            info!(run_id = ?context.run_id, "{text}");
        }
    });

    vec![progress, results]
}
