//! Task domain model — one node of a [`Plan`](super::plan::Plan).
//!
//! Adapted from the `Task`/`TaskStatus` (`domain/models/task.rs`):
//! same status-machine shape, generalized from a `Uuid`-keyed persisted task
//! store to a plan-scoped, string-id task owned by exactly one `Plan`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task within its plan's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Declared but not yet ready (dependencies outstanding).
    Pending,
    /// Dependencies satisfied; eligible for the current wave.
    Ready,
    /// Currently executing.
    Running,
    /// Completed successfully (I2).
    Completed,
    /// Exhausted retries/fallbacks (I2).
    Failed,
    /// A dependency failed; this task never ran (§4.8 cancellation).
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped
        )
    }
}

/// Coarse task-complexity tier used by the Model Router (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskTier {
    Tier1 = 1,
    Tier2 = 2,
    Tier3 = 3,
}

impl TaskTier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Estimate a task's tier from keywords in its description (§4.5).
    ///
    /// "batch", "loop", "each file", "python code", "generate code" ⇒ 3;
    /// "then", "after", "multi-step" ⇒ 2; else 1.
    pub fn estimate(description: &str) -> Self {
        let lower = description.to_lowercase();
        const TIER3_KEYWORDS: &[&str] = &[
            "batch",
            "loop",
            "each file",
            "python code",
            "generate code",
        ];
        const TIER2_KEYWORDS: &[&str] = &["then", "after", "multi-step"];

        if TIER3_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Self::Tier3
        } else if TIER2_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Self::Tier2
        } else {
            Self::Tier1
        }
    }
}

/// One attempt at executing a task: the model used and the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAttempt {
    pub model: String,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Terminal outcome of a single attempt, reported to the Router's feedback
/// loop (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    EmptyResponse,
    ValidationFail,
    Error,
}

/// One node of a [`Plan`](super::plan::Plan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub agent_role: String,
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub tier_estimate: TaskTier,
    pub result: Option<String>,
    pub attempts: Vec<TaskAttempt>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>, agent_role: impl Into<String>, dependencies: Vec<String>) -> Self {
        let description = description.into();
        Self {
            id: id.into(),
            tier_estimate: TaskTier::estimate(&description),
            description,
            agent_role: agent_role.into(),
            dependencies,
            status: TaskStatus::Pending,
            result: None,
            attempts: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the task completed with a non-empty result (I2).
    pub fn complete(&mut self, result: String, now: DateTime<Utc>) {
        self.result = Some(result);
        self.status = TaskStatus::Completed;
        self.finished_at = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.finished_at = Some(now);
    }

    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Skipped;
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_estimate_keywords() {
        assert_eq!(TaskTier::estimate("read a file"), TaskTier::Tier1);
        assert_eq!(TaskTier::estimate("first list files, then summarize"), TaskTier::Tier2);
        assert_eq!(TaskTier::estimate("generate code for each file in a batch"), TaskTier::Tier3);
    }

    #[test]
    fn complete_sets_terminal_status_and_result() {
        let mut t = Task::new("task_1", "read file", "READER", vec![]);
        t.complete("contents".to_string(), Utc::now());
        assert_eq!(t.status, TaskStatus::Completed);
        assert!(t.status.is_terminal());
        assert_eq!(t.result.as_deref(), Some("contents"));
    }
}
