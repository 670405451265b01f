//! Jobs of a synchronization run.
//!
//! A run consists of one [`fetch::FetchJob`] per data source, executed concurrently through the
//! [`pool::FetchJobPool`], followed by a single [`analyze::AnalyzeJob`] over the merged results.

pub mod analyze;
mod base;
pub mod fetch;
pub mod pool;

pub use base::SyncJob;
