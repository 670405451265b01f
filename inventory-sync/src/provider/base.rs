use std::future::Future;

use crate::error::SyncJobResult;
use crate::types::{DataSourceConfiguration, PollResult};

/// Trait for systems that can be polled for inventory objects.
///
/// A provider is shared by every fetch job of a run and polled concurrently, once per
/// configured data source.
///
/// Failures affecting single items must be recorded in the returned [`PollResult`] so the
/// remaining items still reach the analyze phase. Returning an error means the data source
/// could not be polled at all and fails the whole run.
pub trait SyncProvider {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Polls the data source described by `config`.
    ///
    /// The returned result must only contain entries for `config.id()`.
    fn poll(
        &self,
        config: &DataSourceConfiguration,
    ) -> impl Future<Output = SyncJobResult<PollResult>> + Send;
}
