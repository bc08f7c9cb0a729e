//! Task-runner port — the seam between the Scheduler (§4.8) and the Task
//! Executor (§4.9). The Scheduler only needs to run one task to a terminal
//! outcome; it does not need to know how the Executor builds prompts, picks
//! models, or retries.

use async_trait::async_trait;

use crate::domain::error::ExecutorError;
use crate::domain::models::task::Task;

/// Runs a single task to completion, mutating its `status`/`result`/
/// `attempts` and returning the final error if it did not succeed.
/// `dependencies` holds the already-terminal tasks `task` depends on, so
/// their descriptions and results can be folded into the prompt (§4.9 step
/// 1) without the runner needing access to the whole `Plan`.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &mut Task, dependencies: &[Task]) -> Result<(), ExecutorError>;
}
