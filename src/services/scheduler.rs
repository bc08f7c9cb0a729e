//! Plan Validator & Scheduler (§4.8).
//!
//! Adapted from the `DagExecutor` (`services/dag_executor.rs`):
//! same wave-by-wave, semaphore-bounded parallel execution and
//! failure-cascades-to-dependents shape, generalized from a `Uuid`-keyed
//! `TaskRepository`/`Substrate` pair to this crate's in-memory `Plan` plus a
//! [`TaskRunner`] port (the Task Executor, §4.9).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::domain::error::SchedulerError;
use crate::domain::models::dag::{DagError, TaskDag};
use crate::domain::models::plan::{Plan, RawPlan, MAX_TASKS, WARN_TASKS};
use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::ports::TaskRunner;

fn map_dag_error(e: DagError) -> SchedulerError {
    match e {
        DagError::CycleDetected => SchedulerError::PlanCycle,
        DagError::UnknownDependency { task, dependency } => {
            SchedulerError::UnknownDependency { task, dependency }
        }
    }
}

/// Validate a Planner's raw output against §4.8's rules and, if it passes,
/// promote it into a scheduled [`Plan`] plus the [`TaskDag`] that drives
/// wave computation.
pub fn validate_plan(raw: &RawPlan, known_roles: &[String]) -> Result<(Plan, TaskDag), SchedulerError> {
    if raw.tasks.is_empty() {
        return Err(SchedulerError::EmptyPlan);
    }
    if raw.tasks.len() > MAX_TASKS {
        return Err(SchedulerError::TooManyTasks(raw.tasks.len()));
    }
    if raw.tasks.len() > WARN_TASKS {
        tracing::warn!(count = raw.tasks.len(), "plan exceeds the recommended {WARN_TASKS} tasks");
    }

    for (idx, task) in raw.tasks.iter().enumerate() {
        let label = if task.id.is_empty() { format!("#{idx}") } else { task.id.clone() };
        if task.id.is_empty() {
            return Err(SchedulerError::MissingField(label, "id"));
        }
        if task.description.is_empty() {
            return Err(SchedulerError::MissingField(label, "description"));
        }
        if task.agent_type.is_empty() {
            return Err(SchedulerError::MissingField(label, "agent_type"));
        }
        if !known_roles.iter().any(|role| role == &task.agent_type) {
            return Err(SchedulerError::UnknownAgent(task.id.clone(), task.agent_type.clone()));
        }
    }

    let dag = TaskDag::new(raw.tasks.iter().map(|t| (t.id.clone(), t.dependencies.clone())));
    dag.validate().map_err(map_dag_error)?;

    let tasks: Vec<Task> = raw
        .tasks
        .iter()
        .map(|t| Task::new(t.id.clone(), t.description.clone(), t.agent_type.clone(), t.dependencies.clone()))
        .collect();

    Ok((Plan::new(tasks), dag))
}

/// Runs a validated plan's tasks wave by wave, bounding per-wave
/// concurrency with a semaphore and cascading skips to the dependents of
/// any task that fails (§4.8 "Cancellation").
pub struct Scheduler {
    runner: Arc<dyn TaskRunner>,
    concurrency: usize,
}

impl Scheduler {
    /// `concurrency` is the wave-parallelism width (§4.8: "default = size
    /// of the model pool's free capacity, minimum 1").
    pub fn new(runner: Arc<dyn TaskRunner>, concurrency: usize) -> Self {
        Self { runner, concurrency: concurrency.max(1) }
    }

    pub async fn run(&self, plan: &mut Plan, dag: &TaskDag) -> Result<(), SchedulerError> {
        let waves = dag.execution_waves().map_err(map_dag_error)?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut skipped: HashSet<String> = HashSet::new();

        for wave in &waves {
            let mut handles = Vec::new();

            for task_id in wave {
                if skipped.contains(task_id) {
                    continue;
                }
                let Some(task) = plan.get(task_id) else { continue };
                let mut task = task.clone();
                let dependencies: Vec<Task> = task.dependencies.iter().filter_map(|d| plan.get(d).cloned()).collect();
                let permit = semaphore.clone().acquire_owned().await.expect("scheduler semaphore is never closed");
                let runner = self.runner.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    task.status = TaskStatus::Running;
                    task.started_at = Some(Utc::now());
                    if let Err(e) = runner.run(&mut task, &dependencies).await {
                        if !task.status.is_terminal() {
                            task.fail(Utc::now());
                        }
                        tracing::warn!(task = %task.id, error = %e, "task failed");
                    }
                    task
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(task) => {
                        let failed = task.status == TaskStatus::Failed;
                        let id = task.id.clone();
                        if let Some(slot) = plan.get_mut(&id) {
                            *slot = task;
                        }
                        if failed {
                            skipped.extend(dag.transitive_dependents(&id));
                        }
                    }
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "task runner task panicked");
                    }
                }
            }
        }

        let now = Utc::now();
        for id in &skipped {
            if let Some(task) = plan.get_mut(id) {
                if !task.status.is_terminal() {
                    task.skip(now);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ExecutorError;
    use crate::domain::models::plan::RawTask;
    use async_trait::async_trait;

    fn roles() -> Vec<String> {
        vec!["READER".to_string(), "CODER".to_string()]
    }

    fn raw(tasks: Vec<RawTask>) -> RawPlan {
        RawPlan { tasks }
    }

    fn task(id: &str, agent: &str, deps: &[&str]) -> RawTask {
        RawTask {
            id: id.to_string(),
            description: format!("do {id}"),
            agent_type: agent.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn rejects_empty_plan() {
        let err = validate_plan(&raw(vec![]), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::EmptyPlan));
    }

    #[test]
    fn rejects_too_many_tasks() {
        let tasks = (0..13).map(|i| task(&format!("t{i}"), "READER", &[])).collect();
        let err = validate_plan(&raw(tasks), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::TooManyTasks(13)));
    }

    #[test]
    fn rejects_unknown_agent_role() {
        let err = validate_plan(&raw(vec![task("t1", "GHOST", &[])]), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownAgent(id, role) if id == "t1" && role == "GHOST"));
    }

    #[test]
    fn rejects_missing_id() {
        let mut t = task("t1", "READER", &[]);
        t.id = String::new();
        let err = validate_plan(&raw(vec![t]), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::MissingField(label, "id") if label == "#0"));
    }

    #[test]
    fn rejects_cycle() {
        let tasks = vec![task("t1", "READER", &["t2"]), task("t2", "READER", &["t1"])];
        let err = validate_plan(&raw(tasks), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::PlanCycle));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = validate_plan(&raw(vec![task("t1", "READER", &["ghost"])]), &roles()).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownDependency { .. }));
    }

    #[test]
    fn accepts_a_valid_plan() {
        let tasks = vec![task("t1", "READER", &[]), task("t2", "CODER", &["t1"])];
        let (plan, dag) = validate_plan(&raw(tasks), &roles()).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(dag.nodes.len(), 2);
    }

    struct AlwaysSucceed;
    #[async_trait]
    impl TaskRunner for AlwaysSucceed {
        async fn run(&self, task: &mut Task, _dependencies: &[Task]) -> Result<(), ExecutorError> {
            task.complete(format!("done:{}", task.id), Utc::now());
            Ok(())
        }
    }

    struct FailsOne(String);
    #[async_trait]
    impl TaskRunner for FailsOne {
        async fn run(&self, task: &mut Task, _dependencies: &[Task]) -> Result<(), ExecutorError> {
            if task.id == self.0 {
                task.fail(Utc::now());
                return Err(ExecutorError::FallbackExhausted("boom".to_string()));
            }
            task.complete(format!("done:{}", task.id), Utc::now());
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_a_diamond_plan_to_completion() {
        let tasks = vec![
            task("t1", "READER", &[]),
            task("t2", "READER", &[]),
            task("t3", "CODER", &["t1"]),
            task("t4", "CODER", &["t1", "t2"]),
        ];
        let (mut plan, dag) = validate_plan(&raw(tasks), &roles()).unwrap();
        let scheduler = Scheduler::new(Arc::new(AlwaysSucceed), 2);

        scheduler.run(&mut plan, &dag).await.unwrap();

        assert!(plan.is_complete());
        for t in &plan.tasks {
            assert_eq!(t.status, TaskStatus::Completed);
        }
    }

    #[tokio::test]
    async fn failed_task_skips_its_dependents_but_not_independent_siblings() {
        let tasks = vec![
            task("t1", "READER", &[]),
            task("t2", "READER", &[]),
            task("t3", "CODER", &["t1"]),
            task("t4", "CODER", &["t2"]),
        ];
        let (mut plan, dag) = validate_plan(&raw(tasks), &roles()).unwrap();
        let scheduler = Scheduler::new(Arc::new(FailsOne("t1".to_string())), 4);

        scheduler.run(&mut plan, &dag).await.unwrap();

        assert_eq!(plan.get("t1").unwrap().status, TaskStatus::Failed);
        assert_eq!(plan.get("t3").unwrap().status, TaskStatus::Skipped);
        assert_eq!(plan.get("t2").unwrap().status, TaskStatus::Completed);
        assert_eq!(plan.get("t4").unwrap().status, TaskStatus::Completed);
    }
}
