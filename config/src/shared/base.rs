use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Maximum concurrent fetches cannot be zero.
    #[error("`max_concurrent_fetches` cannot be zero")]
    MaxConcurrentFetchesZero,
    /// A fetch timeout was configured with a zero duration.
    #[error("`fetch_timeout_ms` must be greater than 0 when set")]
    FetchTimeoutZero,
    /// Two data sources share the same identifier.
    #[error("data source id {0} is configured more than once")]
    DuplicateDataSourceId(u64),
    /// A data source has an empty name.
    #[error("data source {0} has an empty name")]
    EmptyDataSourceName(u64),
}
