//! Tracing and metrics setup shared by the synchronization binaries and tests.

pub mod metrics;
pub mod tracing;
