use std::collections::HashMap;

use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error};

use crate::error::{ErrorKind, SyncJobError, SyncJobResult, panic_message};
use crate::sync_error;
use crate::types::{DataSourceId, PollResult};

/// Pool running the fetch jobs of one synchronization run.
///
/// Every spawned future runs on its own task of the multi-threaded runtime. Completions are
/// yielded in the order the tasks finish, each tagged with the data source it belongs to. A
/// task that panics or is cancelled still yields a completion for its data source, carrying an
/// [`ErrorKind::FetchJobPanic`] error.
#[derive(Debug, Default)]
pub struct FetchJobPool {
    join_set: JoinSet<SyncJobResult<PollResult>>,
    data_sources: HashMap<task::Id, DataSourceId>,
}

impl FetchJobPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a fetch job for `data_source_id`.
    pub fn spawn<F>(&mut self, data_source_id: DataSourceId, future: F)
    where
        F: Future<Output = SyncJobResult<PollResult>> + Send + 'static,
    {
        let handle = self.join_set.spawn(future);
        self.data_sources.insert(handle.id(), data_source_id);

        debug!(%data_source_id, task_id = %handle.id(), "spawned fetch job in pool");
    }

    /// Waits for the next fetch job to finish.
    ///
    /// Returns `None` once every spawned job has been joined.
    pub async fn join_next(&mut self) -> Option<(DataSourceId, SyncJobResult<PollResult>)> {
        loop {
            let (task_id, result) = match self.join_set.join_next_with_id().await? {
                Ok((task_id, result)) => (task_id, Ok(result)),
                Err(join_err) => (join_err.id(), Err(join_err)),
            };

            let Some(data_source_id) = self.data_sources.remove(&task_id) else {
                // Every task is registered at spawn, so this only logs a broken invariant.
                error!(%task_id, "fetch task finished without a known data source");
                continue;
            };

            let result = match result {
                Ok(result) => result,
                Err(join_err) => Err(task_failure(data_source_id, join_err)),
            };
            return Some((data_source_id, result));
        }
    }

    /// Returns the number of jobs that have not been joined yet.
    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }
}

fn task_failure(data_source_id: DataSourceId, join_err: JoinError) -> SyncJobError {
    if join_err.is_panic() {
        let message = panic_message(join_err.into_panic().as_ref());
        return sync_error!(
            ErrorKind::FetchJobPanic,
            "Fetch job panicked",
            detail = format!("data source {data_source_id}: {message}")
        );
    }

    sync_error!(
        ErrorKind::FetchJobPanic,
        "Fetch job was cancelled",
        detail = format!("data source {data_source_id}: {join_err}")
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::SyncItem;

    async fn delayed_poll(id: u64, delay: Duration) -> SyncJobResult<PollResult> {
        tokio::time::sleep(delay).await;
        Ok(PollResult::for_source(
            DataSourceId(id),
            vec![SyncItem::new(format!("item-{id}"), "Host")],
            vec![],
        ))
    }

    #[tokio::test]
    async fn yields_every_completion_once() {
        let mut pool = FetchJobPool::new();

        for id in 1..=3u64 {
            pool.spawn(DataSourceId(id), delayed_poll(id, Duration::from_millis(10 * (4 - id))));
        }
        assert_eq!(pool.len(), 3);

        let mut joined = Vec::new();
        while let Some((id, result)) = pool.join_next().await {
            assert_eq!(result.unwrap().total_items(), 1);
            joined.push(id);
        }

        joined.sort();
        assert_eq!(joined, vec![DataSourceId(1), DataSourceId(2), DataSourceId(3)]);
        assert!(pool.is_empty());
    }

    async fn crashing_poll() -> SyncJobResult<PollResult> {
        panic!("driver crashed")
    }

    #[tokio::test]
    async fn panic_is_attributed_to_its_data_source() {
        let mut pool = FetchJobPool::new();
        pool.spawn(DataSourceId(8), crashing_poll());

        let (id, result) = pool.join_next().await.unwrap();

        assert_eq!(id, DataSourceId(8));
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchJobPanic);
        assert!(err.detail().unwrap().contains("driver crashed"));
        assert!(pool.join_next().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_job_is_reported_for_its_data_source() {
        let mut pool = FetchJobPool::new();
        pool.spawn(DataSourceId(4), delayed_poll(4, Duration::from_secs(3600)));
        pool.spawn(DataSourceId(5), delayed_poll(5, Duration::from_secs(3600)));

        pool.join_set.abort_all();

        let mut cancelled = Vec::new();
        while let Some((id, result)) = pool.join_next().await {
            let err = result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FetchJobPanic);
            assert!(err.detail().unwrap().starts_with(&format!("data source {id}")));
            cancelled.push(id);
        }

        cancelled.sort();
        assert_eq!(cancelled, vec![DataSourceId(4), DataSourceId(5)]);
        assert!(pool.data_sources.is_empty());
    }
}
