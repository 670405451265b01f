use std::future::Future;

use crate::error::SyncJobResult;
use crate::types::{JobId, JobStep};

/// Trait for the units of work a synchronization run is made of.
///
/// A job is run once. Its output is only available after [`SyncJob::run`] returned `Ok`;
/// before that, or after a failed run, [`SyncJob::value`] returns `None`.
pub trait SyncJob {
    /// Value produced by a successful run.
    type Output;

    /// Returns the identifier allocated to this job.
    fn job_id(&self) -> JobId;

    /// Returns the step of the run this job performs.
    fn step(&self) -> JobStep;

    /// Performs the job's work and stores its output.
    fn run(&mut self) -> impl Future<Output = SyncJobResult<()>> + Send;

    /// Returns the output of a completed run.
    fn value(&self) -> Option<&Self::Output>;

    /// Consumes the job, returning the output of a completed run.
    fn into_value(self) -> Option<Self::Output>;
}
