use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use config::shared::SyncConfig;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::broadcast::{BroadcastContext, ProgressBroadcaster, ResultBroadcaster};
use crate::error::{ErrorKind, SyncJobError, SyncJobResult, panic_message};
use crate::inventory::Inventory;
use crate::jobs::SyncJob;
use crate::jobs::analyze::AnalyzeJob;
use crate::jobs::fetch::FetchJob;
use crate::jobs::pool::FetchJobPool;
use crate::metrics::{
    DATA_SOURCE_ID_LABEL, MODE_LABEL, OUTCOME_LABEL, SYNC_FETCH_TASKS_COMPLETED_TOTAL,
    SYNC_RUN_DURATION_SECONDS,
};
use crate::provider::SyncProvider;
use crate::sync_error;
use crate::types::{
    DataSourceConfiguration, JobId, JobProgressMessage, JobState, JobStep, PollResult, SyncResult,
};

/// Runs synchronizations: concurrent fetching followed by a single analysis.
///
/// The orchestrator owns the inventory handle and the job sequence. Broadcasters are passed in
/// by the caller, which registers its listeners on them before starting a run.
#[derive(Debug)]
pub struct SyncOrchestrator<I> {
    config: SyncConfig,
    inventory: Arc<I>,
    progress_broadcaster: ProgressBroadcaster,
    result_broadcaster: ResultBroadcaster,
    job_sequence: AtomicU64,
}

impl<I> SyncOrchestrator<I>
where
    I: Inventory + Send + Sync + 'static,
{
    /// Creates an orchestrator after validating `config`.
    pub fn new(
        config: SyncConfig,
        inventory: I,
        progress_broadcaster: ProgressBroadcaster,
        result_broadcaster: ResultBroadcaster,
    ) -> SyncJobResult<Self> {
        if let Err(err) = config.validate() {
            return Err(sync_error!(
                ErrorKind::ConfigError,
                "Invalid synchronization configuration",
                err.to_string(),
                source: err
            ));
        }

        Ok(Self {
            config,
            inventory: Arc::new(inventory),
            progress_broadcaster,
            result_broadcaster,
            job_sequence: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn progress_broadcaster(&self) -> &ProgressBroadcaster {
        &self.progress_broadcaster
    }

    pub fn result_broadcaster(&self) -> &ResultBroadcaster {
        &self.result_broadcaster
    }

    pub fn inventory(&self) -> &Arc<I> {
        &self.inventory
    }

    fn next_job_id(&self) -> JobId {
        JobId(self.job_sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Polls every data source in `configs` and analyzes the merged result.
    ///
    /// Fetch jobs run concurrently, at most [`SyncConfig::max_concurrent_fetches`] at a time,
    /// and the analysis starts only once all of them finished. If any fetch job failed, the
    /// run fails with the errors of all failed jobs and the analysis does not run.
    ///
    /// On success the results are broadcast (when enabled) followed by a completion message,
    /// and returned. Failures are only returned, never broadcast.
    pub async fn run_synchronization<P>(
        &self,
        provider: Arc<P>,
        configs: Vec<DataSourceConfiguration>,
    ) -> SyncJobResult<Vec<SyncResult>>
    where
        P: SyncProvider + Send + Sync + 'static,
    {
        let run_id = self.next_job_id();
        let context = BroadcastContext::for_run(run_id);
        let started = Instant::now();

        info!(
            %run_id,
            provider = provider.name(),
            data_sources = configs.len(),
            mode = %self.config.mode,
            "starting synchronization run"
        );

        let poll_result = self.fetch_all(run_id, provider, configs).await?;

        let analyze_job_id = self.next_job_id();
        let mut job = AnalyzeJob::new(
            analyze_job_id,
            1,
            0,
            poll_result,
            self.inventory.clone(),
            self.config.mode,
            self.progress_broadcaster.clone(),
            run_id,
        );

        let handle = tokio::spawn(async move {
            job.run().await?;
            Ok::<_, SyncJobError>(job)
        });
        let job = match handle.await {
            Ok(result) => result?,
            Err(err) => {
                let detail = if err.is_panic() {
                    panic_message(err.into_panic().as_ref())
                } else {
                    err.to_string()
                };
                return Err(sync_error!(
                    ErrorKind::AnalyzeJobPanic,
                    "Analyze job panicked",
                    detail = format!("job {analyze_job_id}: {detail}")
                ));
            }
        };
        let results = job.into_value().unwrap_or_default();

        if self.config.broadcast_results {
            self.result_broadcaster
                .publish_results(Arc::new(results.clone()), context);
        }
        self.result_broadcaster.publish_text(
            format!(
                "Synchronization finished with {} result{}",
                results.len(),
                if results.len() == 1 { "" } else { "s" }
            ),
            context,
        );

        let elapsed = started.elapsed();
        histogram!(
            SYNC_RUN_DURATION_SECONDS,
            MODE_LABEL => self.config.mode.to_string(),
        )
        .record(elapsed.as_secs_f64());

        info!(
            %run_id,
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "synchronization run finished"
        );

        Ok(results)
    }

    /// Runs one fetch job per configuration and merges their results.
    ///
    /// Every job is joined even after a failure so all errors are reported together.
    async fn fetch_all<P>(
        &self,
        run_id: JobId,
        provider: Arc<P>,
        configs: Vec<DataSourceConfiguration>,
    ) -> SyncJobResult<PollResult>
    where
        P: SyncProvider + Send + Sync + 'static,
    {
        let context = BroadcastContext::for_run(run_id);
        let total = configs.len() as u64;
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_fetches as usize));
        let timeout = self.config.fetch_timeout_ms.map(Duration::from_millis);

        let mut pool = FetchJobPool::new();
        for config in configs {
            let data_source_id = config.id();
            let mut job = FetchJob::new(self.next_job_id(), provider.clone(), config);
            if let Some(timeout) = timeout {
                job = job.with_timeout(timeout);
            }

            let permits = permits.clone();
            pool.spawn(data_source_id, async move {
                let _permit = permits.acquire_owned().await.map_err(|err| {
                    sync_error!(
                        ErrorKind::InvalidState,
                        "Fetch concurrency limiter was closed",
                        err.to_string(),
                        source: err
                    )
                })?;

                job.run().await?;
                Ok::<_, SyncJobError>(job.into_value().unwrap_or_default())
            });
        }

        let mut accumulator = PollResult::new();
        let mut errors = Vec::new();
        let mut completed = 0;

        if total == 0 {
            self.progress_broadcaster.broadcast(
                JobProgressMessage::new(run_id, JobStep::Fetch, JobState::Finished, 0, 0),
                context,
            );
        }

        while let Some((data_source_id, result)) = pool.join_next().await {
            completed += 1;

            let outcome = match result {
                Ok(fragment) => {
                    debug!(
                        %run_id,
                        %data_source_id,
                        items = fragment.total_items(),
                        failures = fragment.total_failures(),
                        "merging fetch result"
                    );
                    accumulator.merge(fragment);
                    "ok"
                }
                Err(err) => {
                    error!(%run_id, %data_source_id, error = %err, "fetch job failed");
                    errors.push(err);
                    "error"
                }
            };

            counter!(
                SYNC_FETCH_TASKS_COMPLETED_TOTAL,
                DATA_SOURCE_ID_LABEL => data_source_id.to_string(),
                OUTCOME_LABEL => outcome,
            )
            .increment(1);

            let state = if completed == total {
                JobState::Finished
            } else {
                JobState::InProgress
            };
            self.progress_broadcaster.broadcast(
                JobProgressMessage::new(run_id, JobStep::Fetch, state, completed, total),
                context,
            );
        }

        if !errors.is_empty() {
            error!(
                %run_id,
                failed = errors.len(),
                total,
                "synchronization run failed while fetching"
            );
            return Err(errors.into());
        }

        info!(
            %run_id,
            data_sources = total,
            items = accumulator.total_items(),
            failures = accumulator.total_failures(),
            "all data sources fetched"
        );

        Ok(accumulator)
    }
}
