use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::error::{ErrorKind, SyncJobResult};
use crate::jobs::SyncJob;
use crate::metrics::{
    DATA_SOURCE_ID_LABEL, PROVIDER_LABEL, SYNC_ITEM_FAILURES_TOTAL, SYNC_ITEMS_FETCHED_TOTAL,
};
use crate::provider::SyncProvider;
use crate::sync_error;
use crate::types::{DataSourceConfiguration, JobId, JobStep, PollResult};

/// Polls a single data source through a [`SyncProvider`].
///
/// Provider errors are not caught: they are returned from [`SyncJob::run`] and fail the run
/// the job belongs to. Per-item failures travel inside the produced [`PollResult`].
#[derive(Debug)]
pub struct FetchJob<P> {
    job_id: JobId,
    provider: Arc<P>,
    config: DataSourceConfiguration,
    timeout: Option<Duration>,
    value: Option<PollResult>,
}

impl<P> FetchJob<P>
where
    P: SyncProvider + Send + Sync,
{
    pub fn new(job_id: JobId, provider: Arc<P>, config: DataSourceConfiguration) -> Self {
        Self {
            job_id,
            provider,
            config,
            timeout: None,
            value: None,
        }
    }

    /// Fails the job with [`ErrorKind::FetchTimeout`] if the poll takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn config(&self) -> &DataSourceConfiguration {
        &self.config
    }
}

impl<P> SyncJob for FetchJob<P>
where
    P: SyncProvider + Send + Sync,
{
    type Output = PollResult;

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn step(&self) -> JobStep {
        JobStep::Fetch
    }

    async fn run(&mut self) -> SyncJobResult<()> {
        let data_source_id = self.config.id();

        debug!(
            job_id = %self.job_id,
            %data_source_id,
            provider = self.provider.name(),
            "polling data source"
        );

        let poll = self.provider.poll(&self.config);
        let mut fragment = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, poll).await.map_err(|_| {
                sync_error!(
                    ErrorKind::FetchTimeout,
                    "Data source poll timed out",
                    detail = format!(
                        "data source {data_source_id} ({}) did not answer within {timeout:?}",
                        self.config.name()
                    )
                )
            })??,
            None => poll.await?,
        };

        let foreign = fragment.retain_source(data_source_id);
        if foreign > 0 {
            warn!(
                %data_source_id,
                foreign,
                "provider returned entries for other data sources, dropping them"
            );
        }

        // A source without entries was still polled, so it must reach the analysis.
        if fragment.is_empty() {
            fragment.add_items(data_source_id, Vec::new());
        }

        let items = fragment.total_items();
        let failures = fragment.total_failures();

        counter!(
            SYNC_ITEMS_FETCHED_TOTAL,
            DATA_SOURCE_ID_LABEL => data_source_id.to_string(),
            PROVIDER_LABEL => self.provider.name().to_string(),
        )
        .increment(items as u64);

        if failures > 0 {
            counter!(
                SYNC_ITEM_FAILURES_TOTAL,
                DATA_SOURCE_ID_LABEL => data_source_id.to_string(),
                PROVIDER_LABEL => self.provider.name().to_string(),
            )
            .increment(failures as u64);
        }

        debug!(
            job_id = %self.job_id,
            %data_source_id,
            items,
            failures,
            "data source polled"
        );

        self.value = Some(fragment);

        Ok(())
    }

    fn value(&self) -> Option<&PollResult> {
        self.value.as_ref()
    }

    fn into_value(self) -> Option<PollResult> {
        self.value
    }
}
