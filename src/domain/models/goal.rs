//! Goal domain model — a top-level objective inside a session's
//! [`DomainMemory`](super::memory::DomainMemory).
//!
//! Adapted from the `Goal` (`domain/models/goal.rs`): dropped the
//! "goals never complete, only retire" convergent-attractor semantics in
//! favor of a plain Goal→Feature hierarchy, where a goal's status is a
//! simple reflection of its features' progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feature::Feature;

/// Status of a goal, derived from the aggregate status of its features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl Default for GoalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// A top-level objective under a session's domain memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    pub status: GoalStatus,
    pub features: Vec<Feature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            constraints: Vec::new(),
            status: GoalStatus::default(),
            features: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn feature_mut(&mut self, id: &str) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.id == id)
    }

    /// Recompute this goal's status from its features' statuses.
    pub fn recompute_status(&mut self) {
        use super::feature::FeatureStatus as FS;

        self.status = if self.features.is_empty() {
            GoalStatus::Pending
        } else if self.features.iter().all(|f| f.status == FS::Completed) {
            GoalStatus::Completed
        } else if self.features.iter().any(|f| f.status == FS::Failed || f.status == FS::Blocked) {
            GoalStatus::Blocked
        } else if self.features.iter().any(|f| f.status != FS::Pending) {
            GoalStatus::InProgress
        } else {
            GoalStatus::Pending
        };
        self.updated_at = Utc::now();
    }
}
