use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use config::shared::SyncMode;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastContext, ProgressBroadcaster};
use crate::error::SyncJobResult;
use crate::inventory::{Inventory, InventoryChange};
use crate::jobs::SyncJob;
use crate::metrics::{MODE_LABEL, RESULT_TYPE_LABEL, SYNC_RESULTS_TOTAL};
use crate::types::{
    AttributeChange, DataSourceId, ItemFailure, JobId, JobProgressMessage, JobState, JobStep,
    PollResult, SyncItem, SyncResult, SyncResultKind, SyncResultType,
};

/// A result together with the inventory change it proposes, if any.
type Proposal = (SyncResult, Option<InventoryChange>);

/// Compares the merged external state against the inventory.
///
/// Data sources are analyzed in ascending id order and the results of one data source keep
/// the order of its failures, fetched items and inventory objects, so the same input always
/// produces the same list.
///
/// In [`SyncMode::Automated`] every proposed create, update and delete is applied to the
/// inventory as soon as it is found. A change the inventory rejects is reported as an error
/// result and the analysis carries on.
pub struct AnalyzeJob<I> {
    job_id: JobId,
    total_jobs: u64,
    job_index: u64,
    poll_result: PollResult,
    inventory: Arc<I>,
    mode: SyncMode,
    progress_broadcaster: ProgressBroadcaster,
    run_id: JobId,
    value: Option<Vec<SyncResult>>,
}

impl<I> AnalyzeJob<I>
where
    I: Inventory + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        total_jobs: u64,
        job_index: u64,
        poll_result: PollResult,
        inventory: Arc<I>,
        mode: SyncMode,
        progress_broadcaster: ProgressBroadcaster,
        run_id: JobId,
    ) -> Self {
        Self {
            job_id,
            total_jobs,
            job_index,
            poll_result,
            inventory,
            mode,
            progress_broadcaster,
            run_id,
            value: None,
        }
    }

    fn emit_progress(&self, state: JobState, completed: u64, total: u64) {
        let message = JobProgressMessage::scaled(
            self.job_id,
            JobStep::Analyze,
            state,
            completed,
            total,
            self.total_jobs,
            self.job_index,
        );
        self.progress_broadcaster
            .broadcast(message, BroadcastContext::for_run(self.run_id));
    }

    async fn analyze_source(
        &self,
        data_source_id: DataSourceId,
    ) -> SyncJobResult<Vec<SyncResult>> {
        let failures = self.poll_result.failures(data_source_id).unwrap_or_default();
        let mut proposals: Vec<Proposal> = failures
            .iter()
            .map(|failure| (fetch_failure(data_source_id, failure), None))
            .collect();

        if let Some(items) = self.poll_result.items(data_source_id) {
            let current = self.inventory.objects(data_source_id).await?;
            proposals.extend(compare(data_source_id, items, current, !failures.is_empty()));
        }

        let mut results = Vec::with_capacity(proposals.len());
        for (result, change) in proposals {
            let result = match change {
                Some(change) if self.mode.applies_changes() => {
                    self.apply(data_source_id, result, &change).await
                }
                _ => result,
            };
            results.push(result);
        }

        Ok(results)
    }

    async fn apply(
        &self,
        data_source_id: DataSourceId,
        result: SyncResult,
        change: &InventoryChange,
    ) -> SyncResult {
        match self.inventory.apply(data_source_id, change).await {
            Ok(()) => result.into_applied(),
            Err(err) => {
                warn!(
                    %data_source_id,
                    key = change.key(),
                    error = %err,
                    "inventory rejected change"
                );
                let reason = match (err.description(), err.detail()) {
                    (Some(description), Some(detail)) => format!("{description}: {detail}"),
                    (Some(description), None) => description.to_string(),
                    (None, _) => err.to_string(),
                };
                result.into_failed(reason)
            }
        }
    }
}

impl<I> SyncJob for AnalyzeJob<I>
where
    I: Inventory + Send + Sync,
{
    type Output = Vec<SyncResult>;

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn step(&self) -> JobStep {
        JobStep::Analyze
    }

    async fn run(&mut self) -> SyncJobResult<()> {
        let data_source_ids = self.poll_result.data_source_ids();
        let total = data_source_ids.len() as u64;

        info!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            data_sources = total,
            mode = %self.mode,
            "analyzing fetched data"
        );

        let mut results = Vec::new();
        for (index, data_source_id) in data_source_ids.into_iter().enumerate() {
            let source_results = self.analyze_source(data_source_id).await?;

            debug!(
                job_id = %self.job_id,
                %data_source_id,
                results = source_results.len(),
                "analyzed data source"
            );

            results.extend(source_results);
            self.emit_progress(JobState::InProgress, index as u64 + 1, total);
        }

        self.emit_progress(JobState::Finished, total, total);

        for result in &results {
            counter!(
                SYNC_RESULTS_TOTAL,
                RESULT_TYPE_LABEL => result.result_type().to_string(),
                MODE_LABEL => self.mode.to_string(),
            )
            .increment(1);
        }

        info!(
            job_id = %self.job_id,
            run_id = %self.run_id,
            results = results.len(),
            applied = results.iter().filter(|result| result.applied()).count(),
            "analysis finished"
        );

        self.value = Some(results);

        Ok(())
    }

    fn value(&self) -> Option<&Vec<SyncResult>> {
        self.value.as_ref()
    }

    fn into_value(self) -> Option<Vec<SyncResult>> {
        self.value
    }
}

fn fetch_failure(data_source_id: DataSourceId, failure: &ItemFailure) -> SyncResult {
    SyncResult::new(
        data_source_id,
        failure.item_key.clone(),
        SyncResultKind::FetchFailure {
            message: failure.message.clone(),
        },
        SyncResultType::Error,
        format!("Fetching failed: {}", failure.message),
    )
}

/// Compares the fetched items of one data source with its inventory objects.
///
/// When the data source was only partially fetched, objects missing from the fetch cannot be
/// told apart from objects that failed to fetch, so no deletions are proposed for it.
fn compare(
    data_source_id: DataSourceId,
    fetched: &[SyncItem],
    current: Vec<SyncItem>,
    partially_fetched: bool,
) -> Vec<Proposal> {
    let current: BTreeMap<String, SyncItem> = current
        .into_iter()
        .map(|item| (item.key.clone(), item))
        .collect();

    let mut proposals = Vec::new();
    let mut seen = HashSet::new();

    for item in fetched {
        if !seen.insert(item.key.as_str()) {
            proposals.push((
                SyncResult::new(
                    data_source_id,
                    Some(item.key.clone()),
                    SyncResultKind::Conflict {
                        reason: "duplicate key in fetched data".to_string(),
                    },
                    SyncResultType::Warning,
                    format!("'{}' was fetched more than once, ignoring duplicate", item.key),
                ),
                None,
            ));
            continue;
        }

        let Some(existing) = current.get(&item.key) else {
            proposals.push((
                SyncResult::new(
                    data_source_id,
                    Some(item.key.clone()),
                    SyncResultKind::Create { item: item.clone() },
                    SyncResultType::Information,
                    format!("Create {} '{}'", item.class_name, item.key),
                ),
                Some(InventoryChange::Create(item.clone())),
            ));
            continue;
        };

        if existing.class_name != item.class_name {
            proposals.push((
                SyncResult::new(
                    data_source_id,
                    Some(item.key.clone()),
                    SyncResultKind::Conflict {
                        reason: format!(
                            "class changed from {} to {}",
                            existing.class_name, item.class_name
                        ),
                    },
                    SyncResultType::Warning,
                    format!(
                        "'{}' is a {} in the inventory but was fetched as {}",
                        item.key, existing.class_name, item.class_name
                    ),
                ),
                None,
            ));
            continue;
        }

        let changes = diff_attributes(&existing.attributes, &item.attributes);
        if changes.is_empty() {
            continue;
        }

        let description = format!(
            "Update {} '{}': {} attribute{} changed",
            item.class_name,
            item.key,
            changes.len(),
            if changes.len() == 1 { "" } else { "s" }
        );
        proposals.push((
            SyncResult::new(
                data_source_id,
                Some(item.key.clone()),
                SyncResultKind::Update {
                    class_name: item.class_name.clone(),
                    changes,
                },
                SyncResultType::Information,
                description,
            ),
            Some(InventoryChange::Update {
                key: item.key.clone(),
                attributes: item.attributes.clone(),
            }),
        ));
    }

    let missing: Vec<&SyncItem> = current
        .values()
        .filter(|object| !seen.contains(object.key.as_str()))
        .collect();

    if missing.is_empty() {
        return proposals;
    }

    if partially_fetched {
        warn!(
            %data_source_id,
            suppressed = missing.len(),
            "data source was only partially fetched, suppressing deletions"
        );
        proposals.push((
            SyncResult::new(
                data_source_id,
                None,
                SyncResultKind::Conflict {
                    reason: "data source was only partially fetched".to_string(),
                },
                SyncResultType::Warning,
                format!(
                    "{} inventory object{} not fetched, deletions suppressed because fetching reported failures",
                    missing.len(),
                    if missing.len() == 1 { " was" } else { "s were" }
                ),
            ),
            None,
        ));
        return proposals;
    }

    for object in missing {
        proposals.push((
            SyncResult::new(
                data_source_id,
                Some(object.key.clone()),
                SyncResultKind::Delete {
                    class_name: object.class_name.clone(),
                },
                SyncResultType::Warning,
                format!("Delete {} '{}'", object.class_name, object.key),
            ),
            Some(InventoryChange::Delete {
                key: object.key.clone(),
            }),
        ));
    }

    proposals
}

/// Returns the attributes whose values differ, in attribute name order.
fn diff_attributes(
    current: &BTreeMap<String, String>,
    proposed: &BTreeMap<String, String>,
) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = current.keys().chain(proposed.keys()).collect();

    names
        .into_iter()
        .filter_map(|name| {
            let current = current.get(name);
            let proposed = proposed.get(name);
            (current != proposed).then(|| AttributeChange {
                attribute: name.clone(),
                current: current.cloned(),
                proposed: proposed.cloned(),
            })
        })
        .collect()
}
