//! Metrics definitions for synchronization monitoring.
//!
//! Metrics are emitted through the [`metrics`] facade and are no-ops unless the embedding
//! application installs a recorder.

/// Label for the data source id in metrics.
pub const DATA_SOURCE_ID_LABEL: &str = "data_source_id";

/// Label for the provider name in metrics.
pub const PROVIDER_LABEL: &str = "provider";

/// Label for the outcome of a fetch task (`ok` or `error`).
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the severity of a synchronization result.
pub const RESULT_TYPE_LABEL: &str = "result_type";

/// Label for the synchronization mode.
pub const MODE_LABEL: &str = "mode";

// Fetch metrics

/// Counter for completed fetch tasks.
pub const SYNC_FETCH_TASKS_COMPLETED_TOTAL: &str = "sync_fetch_tasks_completed_total";

/// Counter for items fetched from external systems.
pub const SYNC_ITEMS_FETCHED_TOTAL: &str = "sync_items_fetched_total";

/// Counter for per-item failures captured by providers.
pub const SYNC_ITEM_FAILURES_TOTAL: &str = "sync_item_failures_total";

// Analyze metrics

/// Counter for synchronization results produced by the analyze phase.
pub const SYNC_RESULTS_TOTAL: &str = "sync_results_total";

/// Histogram for the duration of a whole synchronization run.
pub const SYNC_RUN_DURATION_SECONDS: &str = "sync_run_duration_seconds";
