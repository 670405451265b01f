use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{DataSourceId, ItemFailure, SyncItem};

/// Items and captured failures gathered from one or more data sources.
///
/// A fetch job produces a fragment holding only its own data source. The orchestrator merges
/// all fragments into a single accumulator which the analyze phase then reads.
///
/// A data source that partially failed is present in both maps: the items that were fetched
/// in `results`, the failures in `exceptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    results: BTreeMap<DataSourceId, Vec<SyncItem>>,
    exceptions: BTreeMap<DataSourceId, Vec<ItemFailure>>,
}

impl PollResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fragment for `data_source_id` with the given items and failures.
    ///
    /// Empty item or failure lists do not create map entries, except that a source returning
    /// neither still gets an (empty) results entry so it is known to have been polled.
    pub fn for_source(
        data_source_id: DataSourceId,
        items: Vec<SyncItem>,
        failures: Vec<ItemFailure>,
    ) -> Self {
        let mut fragment = Self::new();

        if !items.is_empty() || failures.is_empty() {
            fragment.add_items(data_source_id, items);
        }

        for failure in failures {
            fragment.add_failure(data_source_id, failure);
        }

        fragment
    }

    /// Appends fetched items for a data source.
    pub fn add_items(&mut self, data_source_id: DataSourceId, items: Vec<SyncItem>) {
        self.results
            .entry(data_source_id)
            .or_default()
            .extend(items);
    }

    /// Records a captured failure for a data source.
    pub fn add_failure(&mut self, data_source_id: DataSourceId, failure: ItemFailure) {
        self.exceptions
            .entry(data_source_id)
            .or_default()
            .push(failure);
    }

    /// Merges another result into this one.
    ///
    /// Entries for a data source already present are appended to, never replaced, so the
    /// outcome does not depend on the order in which fragments are merged.
    pub fn merge(&mut self, other: PollResult) {
        for (data_source_id, items) in other.results {
            self.add_items(data_source_id, items);
        }

        for (data_source_id, failures) in other.exceptions {
            self.exceptions
                .entry(data_source_id)
                .or_default()
                .extend(failures);
        }
    }

    /// Drops the entries of every data source other than `data_source_id`.
    ///
    /// Returns the number of data sources that were dropped.
    pub fn retain_source(&mut self, data_source_id: DataSourceId) -> usize {
        let before = self.data_source_ids().len();
        self.results.retain(|id, _| *id == data_source_id);
        self.exceptions.retain(|id, _| *id == data_source_id);
        before - self.data_source_ids().len()
    }

    pub fn results(&self) -> &BTreeMap<DataSourceId, Vec<SyncItem>> {
        &self.results
    }

    pub fn exceptions(&self) -> &BTreeMap<DataSourceId, Vec<ItemFailure>> {
        &self.exceptions
    }

    /// Returns the items fetched for a data source.
    pub fn items(&self, data_source_id: DataSourceId) -> Option<&[SyncItem]> {
        self.results.get(&data_source_id).map(Vec::as_slice)
    }

    /// Returns the failures captured for a data source.
    pub fn failures(&self, data_source_id: DataSourceId) -> Option<&[ItemFailure]> {
        self.exceptions.get(&data_source_id).map(Vec::as_slice)
    }

    /// Returns every data source present in either map, in ascending order.
    pub fn data_source_ids(&self) -> Vec<DataSourceId> {
        let mut ids: Vec<DataSourceId> = self
            .results
            .keys()
            .chain(self.exceptions.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn total_items(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.exceptions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.exceptions.is_empty()
    }
}
