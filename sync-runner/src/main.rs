//! Runs one inventory synchronization from the command line.
//!
//! Reads the data sources and sync settings from `configuration/`, polls every data source
//! from its JSON export, compares the result with the inventory snapshot and prints the
//! synchronization results as JSON on stdout.

use telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_runner_config;
use crate::core::run_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let runner_config = load_runner_config()?;

    init_tracing(env!("CARGO_BIN_NAME"))?;

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_with_config(runner_config));

    if let Err(err) = &result {
        error!("{err:#}");
    }

    result
}
