//! Feature domain model — an atomic, testable unit of work under a
//! [`Goal`](super::goal::Goal).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a feature (§3 data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl Default for FeatureStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Priority of a feature, used for display/triage only — the engine does
/// not schedule by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeaturePriority {
    Low,
    Normal,
    High,
}

impl Default for FeaturePriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// One recorded test execution against a feature (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub passed: bool,
    #[serde(default)]
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// An atomic, testable unit of work under a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    pub status: FeatureStatus,
    pub priority: FeaturePriority,
    pub assignee: Option<String>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feature {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            criteria: Vec::new(),
            tests: Vec::new(),
            status: FeatureStatus::default(),
            priority: FeaturePriority::default(),
            assignee: None,
            test_results: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True if any recorded test result for this feature is a failure.
    pub fn has_failing_test(&self) -> bool {
        self.test_results.iter().any(|t| !t.passed)
    }

    /// All declared tests have at least one passing result and none fail.
    fn all_tests_passing(&self) -> bool {
        !self.test_results.is_empty() && !self.has_failing_test()
    }

    /// Append a test result and derive the feature's new status (§4.4, P6):
    /// any failure ⇒ `Failed` (or `InProgress` if results are mixed with
    /// prior passes and the feature was never completed); all present tests
    /// passing ⇒ `InProgress` — completion always requires an explicit
    /// `update_feature_status` call.
    pub fn add_test_result(&mut self, result: TestResult) {
        let failing = !result.passed;
        self.test_results.push(result);
        self.updated_at = Utc::now();

        if failing {
            self.status = if self.test_results.len() > 1 && self.test_results.iter().any(|t| t.passed) {
                FeatureStatus::InProgress
            } else {
                FeatureStatus::Failed
            };
        } else if self.all_tests_passing() {
            self.status = FeatureStatus::InProgress;
        }
    }

    /// Transition status; rejects `Completed` while a failing test result is
    /// attached (I3), unless `force` is set (not exposed to agents — only
    /// used by trusted internal callers such as the Initializer).
    pub fn set_status(&mut self, status: FeatureStatus, force: bool) -> Result<(), super::super::error::MemoryError> {
        if status == FeatureStatus::Completed && self.has_failing_test() && !force {
            return Err(super::super::error::MemoryError::InvariantViolation(format!(
                "feature '{}' has a failing test result and cannot be marked completed",
                self.id
            )));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
