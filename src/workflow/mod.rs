// Ideaflow - Minimal task orchestration
//
// Tasks run in sequence; one task can be expanded over a list of inputs
// (fan-out), producing one mapped instance per input. A task instance ends in
// one of three states: success, skipped or failed.

pub mod expand;

pub use expand::expand;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("task '{task_id}' failed in {failed} of {total} mapped instances; first failure: {first_error}")]
    UpstreamFailed {
        task_id: String,
        failed: usize,
        total: usize,
        first_error: String,
    },
}

/// What a task body returns when it does not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Done(T),
    /// The task intentionally did nothing. Not an error.
    Skipped(String),
}

impl<T> TaskOutcome<T> {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Success => "success",
            TaskState::Skipped => "skipped",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum InstanceOutcome<T> {
    Success(T),
    Skipped(String),
    Failed(anyhow::Error),
}

/// Result of one fan-out branch.
#[derive(Debug)]
pub struct MappedInstance<T> {
    pub map_index: usize,
    pub duration: Duration,
    pub outcome: InstanceOutcome<T>,
}

impl<T> MappedInstance<T> {
    pub fn new(
        map_index: usize,
        result: anyhow::Result<TaskOutcome<T>>,
        duration: Duration,
    ) -> Self {
        let outcome = match result {
            Ok(TaskOutcome::Done(value)) => InstanceOutcome::Success(value),
            Ok(TaskOutcome::Skipped(reason)) => InstanceOutcome::Skipped(reason),
            Err(e) => InstanceOutcome::Failed(e),
        };
        Self {
            map_index,
            duration,
            outcome,
        }
    }

    pub fn state(&self) -> TaskState {
        match self.outcome {
            InstanceOutcome::Success(_) => TaskState::Success,
            InstanceOutcome::Skipped(_) => TaskState::Skipped,
            InstanceOutcome::Failed(_) => TaskState::Failed,
        }
    }

    pub fn summary(&self) -> InstanceSummary {
        let detail = match &self.outcome {
            InstanceOutcome::Success(_) => None,
            InstanceOutcome::Skipped(reason) => Some(reason.clone()),
            InstanceOutcome::Failed(e) => Some(format!("{:#}", e)),
        };
        InstanceSummary {
            map_index: self.map_index,
            state: self.state(),
            duration_ms: self.duration.as_millis() as u64,
            detail,
        }
    }
}

/// Serializable view of a mapped instance for run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    pub map_index: usize,
    pub state: TaskState,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Upstream results as seen by a downstream task under the all-success rule.
#[derive(Debug, PartialEq, Eq)]
pub enum Upstream<T> {
    /// Every instance succeeded; values in map-index order.
    Ready(Vec<T>),
    /// No instance failed but some were skipped, so the downstream task is
    /// skipped as well.
    Skipped { skipped: usize, total: usize },
}

/// Gather the values of mapped instances for the downstream task.
///
/// Any failed instance fails the collection. Otherwise any skipped instance
/// skips the downstream task, so it never runs on partial input.
pub fn collect_successes<T>(
    task_id: &str,
    instances: Vec<MappedInstance<T>>,
) -> Result<Upstream<T>, WorkflowError> {
    let total = instances.len();
    let mut values = Vec::with_capacity(total);
    let mut skipped = 0;
    let mut failed = 0;
    let mut first_error = None;

    for instance in instances {
        match instance.outcome {
            InstanceOutcome::Success(v) => values.push(v),
            InstanceOutcome::Skipped(_) => skipped += 1,
            InstanceOutcome::Failed(e) => {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(format!("[map_index={}] {:#}", instance.map_index, e));
                }
            }
        }
    }

    if let Some(first_error) = first_error {
        return Err(WorkflowError::UpstreamFailed {
            task_id: task_id.to_string(),
            failed,
            total,
            first_error,
        });
    }
    if skipped > 0 {
        return Ok(Upstream::Skipped { skipped, total });
    }
    Ok(Upstream::Ready(values))
}

/// Identity and timing of a single workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct DagRun {
    pub run_id: Uuid,
    pub dag_id: String,
    pub started_at: DateTime<Utc>,
}

impl DagRun {
    pub fn start(dag_id: impl Into<String>) -> Self {
        let run = Self {
            run_id: Uuid::new_v4(),
            dag_id: dag_id.into(),
            started_at: Utc::now(),
        };
        tracing::info!(dag_id = %run.dag_id, run_id = %run.run_id, "DAG run started");
        run
    }
}
