//! Shared configuration types for synchronization runs.

mod base;
mod runner;
mod sync;

pub use base::ValidationError;
pub use runner::{DataSourceConfig, RunnerConfig};
pub use sync::{SyncConfig, SyncMode};
