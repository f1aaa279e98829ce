//! Resumable collection plans.
//!
//! A plan is the ordered list of collection targets for a run together with
//! per-task status. Task status moves `pending → completed | failed`; a
//! resumed run requeues `failed → pending` and skips `completed` tasks.
//! Plans are persisted after every task through a [`PlanRecorder`], either as
//! a JSON file ([`JsonPlanFile`]) or in Postgres (`bikefmv-db`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::records::{CollectionStats, CollectionTarget};
use crate::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(CoreError::UnknownTaskStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("task {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task index {index} out of range (plan has {len} tasks)")]
    TaskOutOfRange { index: usize, len: usize },

    #[error("plan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("plan store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTask {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub source: Source,
    pub url: String,
    pub records_target: u32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CollectionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanTask {
    #[must_use]
    pub fn target(&self) -> CollectionTarget {
        CollectionTarget {
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year,
            source: self.source,
            url: self.url.clone(),
        }
    }

    /// `"<brand> <model>"`, the key used for per-model run summaries.
    #[must_use]
    pub fn model_key(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPlan {
    pub generated_at: DateTime<Utc>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub tasks: Vec<PlanTask>,
}

impl CollectionPlan {
    /// Wraps planner output into a fresh plan with every task `pending`.
    #[must_use]
    pub fn from_targets(targets: Vec<CollectionTarget>, records_target: u32) -> Self {
        let tasks: Vec<PlanTask> = targets
            .into_iter()
            .map(|t| PlanTask {
                brand: t.brand,
                model: t.model,
                year: t.year,
                source: t.source,
                url: t.url,
                records_target,
                status: TaskStatus::Pending,
                result: None,
                error: None,
            })
            .collect();
        Self {
            generated_at: Utc::now(),
            total_tasks: tasks.len(),
            completed_tasks: 0,
            tasks,
        }
    }

    /// Indices of tasks that still need to run, in plan order.
    #[must_use]
    pub fn runnable_indices(&self) -> Vec<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    /// Moves every `failed` task back to `pending` so a resumed run retries it.
    /// Returns how many tasks were requeued.
    pub fn requeue_failed(&mut self) -> usize {
        let mut requeued = 0;
        for task in &mut self.tasks {
            if task.status == TaskStatus::Failed {
                task.status = TaskStatus::Pending;
                task.error = None;
                requeued += 1;
            }
        }
        requeued
    }

    /// Marks a pending task completed with its collection result.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTransition`] unless the task is `pending`.
    pub fn mark_completed(&mut self, index: usize, stats: CollectionStats) -> Result<(), PlanError> {
        let task = self.pending_task_mut(index, TaskStatus::Completed)?;
        task.status = TaskStatus::Completed;
        task.result = Some(stats);
        task.error = None;
        self.recount();
        Ok(())
    }

    /// Marks a pending task failed with the error message.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidTransition`] unless the task is `pending`.
    pub fn mark_failed(&mut self, index: usize, error: impl Into<String>) -> Result<(), PlanError> {
        let task = self.pending_task_mut(index, TaskStatus::Failed)?;
        task.status = TaskStatus::Failed;
        task.error = Some(error.into());
        self.recount();
        Ok(())
    }

    #[must_use]
    pub fn failed_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count()
    }

    fn pending_task_mut(&mut self, index: usize, to: TaskStatus) -> Result<&mut PlanTask, PlanError> {
        let len = self.tasks.len();
        let task = self
            .tasks
            .get_mut(index)
            .ok_or(PlanError::TaskOutOfRange { index, len })?;
        if task.status != TaskStatus::Pending {
            return Err(PlanError::InvalidTransition {
                index,
                from: task.status,
                to,
            });
        }
        Ok(task)
    }

    fn recount(&mut self) {
        self.total_tasks = self.tasks.len();
        self.completed_tasks = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
    }
}

/// Persists plan progress after each task transition.
#[async_trait]
pub trait PlanRecorder: Send + Sync {
    async fn record_task(&self, plan: &CollectionPlan, index: usize) -> Result<(), PlanError>;
}

/// Stores a plan as a pretty-printed JSON file, rewritten after every task.
#[derive(Debug, Clone)]
pub struct JsonPlanFile {
    path: PathBuf,
}

impl JsonPlanFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a previously written plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Io`] if the file cannot be read or
    /// [`PlanError::Serialize`] if it is not a valid plan.
    pub async fn load(&self) -> Result<CollectionPlan, PlanError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the whole plan, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Io`] on filesystem failure.
    pub async fn save(&self, plan: &CollectionPlan) -> Result<(), PlanError> {
        let body = serde_json::to_string_pretty(plan)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> PlanError {
        PlanError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl PlanRecorder for JsonPlanFile {
    async fn record_task(&self, plan: &CollectionPlan, _index: usize) -> Result<(), PlanError> {
        self.save(plan).await
    }
}
