use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncJobResult};
use crate::provider::SyncProvider;
use crate::types::{DataSourceConfiguration, DataSourceId, ItemFailure, PollResult, SyncItem};

/// Canned answer for one data source.
#[derive(Debug, Clone, Default)]
struct Fixture {
    items: Vec<SyncItem>,
    failures: Vec<ItemFailure>,
    error: Option<String>,
    delay: Option<Duration>,
    panics: bool,
}

#[derive(Debug, Default)]
struct Inner {
    polled: Vec<DataSourceId>,
}

/// In-memory provider answering polls from fixtures.
///
/// Data sources without a fixture are polled successfully and return no items. The provider
/// records every poll and the highest number of polls that were in flight at the same time,
/// which makes it suitable for asserting the orchestrator's scheduling behavior.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    fixtures: HashMap<DataSourceId, Fixture>,
    inner: Arc<Mutex<Inner>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds items returned for `data_source_id`.
    pub fn with_items(
        mut self,
        data_source_id: impl Into<DataSourceId>,
        items: Vec<SyncItem>,
    ) -> Self {
        self.fixture(data_source_id).items.extend(items);
        self
    }

    /// Adds a per-item failure reported for `data_source_id`.
    pub fn with_failure(
        mut self,
        data_source_id: impl Into<DataSourceId>,
        failure: ItemFailure,
    ) -> Self {
        self.fixture(data_source_id).failures.push(failure);
        self
    }

    /// Makes polling `data_source_id` fail with an unrecoverable error.
    pub fn with_error(
        mut self,
        data_source_id: impl Into<DataSourceId>,
        message: impl Into<String>,
    ) -> Self {
        self.fixture(data_source_id).error = Some(message.into());
        self
    }

    /// Delays the answer for `data_source_id`.
    pub fn with_delay(mut self, data_source_id: impl Into<DataSourceId>, delay: Duration) -> Self {
        self.fixture(data_source_id).delay = Some(delay);
        self
    }

    /// Makes polling `data_source_id` panic, simulating a broken provider.
    pub fn with_panic(mut self, data_source_id: impl Into<DataSourceId>) -> Self {
        self.fixture(data_source_id).panics = true;
        self
    }

    /// Returns the data sources polled so far, in the order the polls started.
    pub async fn polled_sources(&self) -> Vec<DataSourceId> {
        let inner = self.inner.lock().await;
        inner.polled.clone()
    }

    /// Returns how many polls were started.
    pub async fn poll_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.polled.len()
    }

    /// Returns the highest number of concurrently running polls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn fixture(&mut self, data_source_id: impl Into<DataSourceId>) -> &mut Fixture {
        self.fixtures.entry(data_source_id.into()).or_default()
    }
}

/// Decrements the in-flight counter when a poll ends, including by panic.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SyncProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn poll(&self, config: &DataSourceConfiguration) -> SyncJobResult<PollResult> {
        let data_source_id = config.id();

        {
            let mut inner = self.inner.lock().await;
            inner.polled.push(data_source_id);
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let Some(fixture) = self.fixtures.get(&data_source_id) else {
            debug!(%data_source_id, "no fixture for data source, returning empty poll");
            return Ok(PollResult::for_source(data_source_id, vec![], vec![]));
        };

        if let Some(delay) = fixture.delay {
            tokio::time::sleep(delay).await;
        }

        if fixture.panics {
            panic!("memory provider fixture panicked for data source {data_source_id}");
        }

        if let Some(message) = &fixture.error {
            bail!(
                ErrorKind::ProviderFailed,
                "Provider poll failed",
                detail = format!("data source {data_source_id} ({}): {message}", config.name())
            );
        }

        debug!(
            %data_source_id,
            items = fixture.items.len(),
            failures = fixture.failures.len(),
            "memory provider answered poll"
        );

        Ok(PollResult::for_source(
            data_source_id,
            fixture.items.clone(),
            fixture.failures.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_from_fixtures() {
        let provider = MemoryProvider::new()
            .with_items(DataSourceId(1), vec![SyncItem::new("switch-1", "Switch")])
            .with_failure(DataSourceId(1), ItemFailure::for_item("switch-2", "snmp timeout"));

        let result = provider
            .poll(&DataSourceConfiguration::new(DataSourceId(1), "core"))
            .await
            .unwrap();

        assert_eq!(result.items(DataSourceId(1)).map(<[_]>::len), Some(1));
        assert_eq!(result.failures(DataSourceId(1)).map(<[_]>::len), Some(1));
        assert_eq!(provider.polled_sources().await, vec![DataSourceId(1)]);
    }

    #[tokio::test]
    async fn unknown_source_returns_empty_poll() {
        let provider = MemoryProvider::new();

        let result = provider
            .poll(&DataSourceConfiguration::new(DataSourceId(42), "unknown"))
            .await
            .unwrap();

        assert_eq!(result.items(DataSourceId(42)), Some(&[][..]));
        assert_eq!(provider.poll_count().await, 1);
    }

    #[tokio::test]
    async fn configured_error_is_unrecoverable() {
        let provider = MemoryProvider::new().with_error(DataSourceId(3), "credentials rejected");

        let err = provider
            .poll(&DataSourceConfiguration::new(DataSourceId(3), "edge"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProviderFailed);
        assert!(err.detail().unwrap().contains("credentials rejected"));
        assert_eq!(provider.max_in_flight(), 1);
    }
}
