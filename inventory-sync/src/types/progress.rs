use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier allocated from the orchestrator's job sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage a progress message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    Fetch,
    Analyze,
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStep::Fetch => f.write_str("fetch"),
            JobStep::Analyze => f.write_str("analyze"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Finished,
}

/// Snapshot of a job's progress, produced once per progress tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgressMessage {
    job_id: JobId,
    step: JobStep,
    state: JobState,
    completed: u64,
    total: u64,
    progress: f32,
    emitted_at: DateTime<Utc>,
}

impl JobProgressMessage {
    /// Creates a message whose progress is `completed / total`.
    ///
    /// A job with nothing to do (`total == 0`) reports full progress.
    pub fn new(job_id: JobId, step: JobStep, state: JobState, completed: u64, total: u64) -> Self {
        Self::scaled(job_id, step, state, completed, total, 1, 0)
    }

    /// Creates a message for job `job_index` out of `total_jobs` jobs sharing the same step.
    ///
    /// The fractional progress spans the whole step: each job covers `1 / total_jobs` of it.
    pub fn scaled(
        job_id: JobId,
        step: JobStep,
        state: JobState,
        completed: u64,
        total: u64,
        total_jobs: u64,
        job_index: u64,
    ) -> Self {
        let job_fraction = if total == 0 {
            1.0
        } else {
            completed.min(total) as f64 / total as f64
        };
        let total_jobs = total_jobs.max(1);
        let progress = ((job_index.min(total_jobs - 1) as f64 + job_fraction) / total_jobs as f64)
            .clamp(0.0, 1.0) as f32;

        Self {
            job_id,
            step,
            state,
            completed,
            total,
            progress,
            emitted_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn step(&self) -> JobStep {
        self.step
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fraction of the step that is done, between `0.0` and `1.0`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_completed_over_total() {
        let message =
            JobProgressMessage::new(JobId(1), JobStep::Fetch, JobState::InProgress, 1, 4);

        assert_eq!(message.progress(), 0.25);
        assert!(!message.is_finished());
    }

    #[test]
    fn empty_job_reports_full_progress() {
        let message = JobProgressMessage::new(JobId(1), JobStep::Fetch, JobState::Finished, 0, 0);

        assert_eq!(message.progress(), 1.0);
        assert!(message.is_finished());
    }

    #[test]
    fn scaled_progress_covers_the_job_share() {
        let halfway_second_job = JobProgressMessage::scaled(
            JobId(7),
            JobStep::Analyze,
            JobState::InProgress,
            1,
            2,
            2,
            1,
        );

        assert_eq!(halfway_second_job.progress(), 0.75);
    }

    #[test]
    fn serializes_step_and_state_in_snake_case() {
        let message =
            JobProgressMessage::new(JobId(3), JobStep::Analyze, JobState::InProgress, 0, 1);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["step"], "analyze");
        assert_eq!(json["state"], "in_progress");
        assert_eq!(json["job_id"], 3);
    }
}
