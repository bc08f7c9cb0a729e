//! Plan domain model — the DAG of tasks produced by the Planner (§4.7) for
//! one user query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;

/// Maximum number of tasks the Planner may emit in one plan (§4.7).
pub const MAX_TASKS: usize = 12;
/// Above this count the Planner should be warned but not rejected.
pub const WARN_TASKS: usize = 8;

/// A raw task as emitted by the Planner, before validation promotes it into
/// a [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTask {
    pub id: String,
    pub description: String,
    pub agent_type: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The Planner's raw JSON output shape (§4.7):
/// `{ "tasks": [ { "id", "description", "agent_type", "dependencies" }, … ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlan {
    pub tasks: Vec<RawTask>,
}

/// A validated, scheduled DAG of tasks for one user query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            created_at: Utc::now(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Every task has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }
}
