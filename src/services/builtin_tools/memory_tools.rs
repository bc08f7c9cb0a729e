//! Memory-mutation built-in tools (§4.3 `memory` category): the only path
//! by which agents mutate a session's [`DomainMemory`](crate::domain::models::memory::DomainMemory),
//! per §4.3/§4.4.
//!
//! Each tool is a thin argument-parsing wrapper around the corresponding
//! [`MemoryStore`] operation; errors from the store map 1:1 onto
//! `BuiltinToolError::ArgError` since they are the agent's to act on.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::error::BuiltinToolError;
use crate::domain::models::feature::{Feature, FeatureStatus, FeaturePriority};
use crate::domain::models::goal::Goal;
use crate::domain::ports::builtin_tool::BuiltinTool;
use crate::services::memory_store::MemoryStore;

fn store_error(e: impl std::fmt::Display, tool: &str) -> BuiltinToolError {
    BuiltinToolError::ArgError { tool: tool.into(), detail: e.to_string() }
}

fn arg_error(e: impl std::fmt::Display, tool: &str) -> BuiltinToolError {
    BuiltinToolError::ArgError { tool: tool.into(), detail: e.to_string() }
}

pub struct AddGoalTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl AddGoalTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct AddGoalArgs {
    id: String,
    description: String,
    #[serde(default)]
    constraints: Vec<String>,
}

#[async_trait]
impl BuiltinTool for AddGoalTool {
    fn name(&self) -> &str {
        "add_goal"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: AddGoalArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "add_goal"))?;
        let mut goal = Goal::new(args.id.clone(), args.description);
        goal.constraints = args.constraints;
        self.store.add_goal(goal, &self.agent).await.map_err(|e| store_error(e, "add_goal"))?;
        Ok(json!({ "id": args.id, "status": "ok" }))
    }
}

pub struct AddFeatureTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl AddFeatureTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct AddFeatureArgs {
    goal_id: String,
    id: String,
    description: String,
    #[serde(default)]
    criteria: Vec<String>,
    #[serde(default)]
    tests: Vec<String>,
    priority: Option<FeaturePriority>,
}

#[async_trait]
impl BuiltinTool for AddFeatureTool {
    fn name(&self) -> &str {
        "add_feature"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: AddFeatureArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "add_feature"))?;
        let mut feature = Feature::new(args.id.clone(), args.description);
        feature.criteria = args.criteria;
        feature.tests = args.tests;
        if let Some(priority) = args.priority {
            feature.priority = priority;
        }
        self.store.add_feature(&args.goal_id, feature, &self.agent).await.map_err(|e| store_error(e, "add_feature"))?;
        Ok(json!({ "id": args.id, "status": "ok" }))
    }
}

pub struct UpdateFeatureStatusTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl UpdateFeatureStatusTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct UpdateFeatureStatusArgs {
    feature_id: String,
    status: FeatureStatus,
    notes: Option<String>,
}

#[async_trait]
impl BuiltinTool for UpdateFeatureStatusTool {
    fn name(&self) -> &str {
        "update_feature_status"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: UpdateFeatureStatusArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "update_feature_status"))?;
        self.store
            .update_feature_status(&args.feature_id, args.status, args.notes, false, &self.agent)
            .await
            .map_err(|e| store_error(e, "update_feature_status"))?;
        Ok(json!({ "feature_id": args.feature_id, "status": "ok" }))
    }
}

pub struct AddTestResultTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl AddTestResultTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct AddTestResultArgs {
    feature_id: String,
    test_id: String,
    passed: bool,
    detail: Option<String>,
}

#[async_trait]
impl BuiltinTool for AddTestResultTool {
    fn name(&self) -> &str {
        "add_test_result"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: AddTestResultArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "add_test_result"))?;
        self.store
            .add_test_result(&args.feature_id, args.test_id, args.passed, args.detail, &self.agent)
            .await
            .map_err(|e| store_error(e, "add_test_result"))?;
        Ok(json!({ "status": "ok" }))
    }
}

pub struct LogProgressTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl LogProgressTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct LogProgressArgs {
    action: String,
    outcome: String,
    feature_id: Option<String>,
}

#[async_trait]
impl BuiltinTool for LogProgressTool {
    fn name(&self) -> &str {
        "log_progress"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: LogProgressArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "log_progress"))?;
        let mut entry = crate::domain::models::progress::ProgressEntry::new(&self.agent, args.action, args.outcome);
        if let Some(fid) = args.feature_id {
            entry = entry.with_feature(fid);
        }
        self.store.log_progress(entry).await.map_err(|e| store_error(e, "log_progress"))?;
        Ok(json!({ "status": "ok" }))
    }
}

pub struct RemoveGoalTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl RemoveGoalTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct RemoveGoalArgs {
    goal_id: String,
    #[serde(default)]
    confirm: bool,
}

#[async_trait]
impl BuiltinTool for RemoveGoalTool {
    fn name(&self) -> &str {
        "remove_goal"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: RemoveGoalArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "remove_goal"))?;
        let count = self.store.remove_goal(&args.goal_id, args.confirm, &self.agent).await.map_err(|e| store_error(e, "remove_goal"))?;
        Ok(json!({ "feature_count": count, "confirmed": args.confirm }))
    }
}

pub struct MoveFeatureTool {
    store: Arc<MemoryStore>,
    agent: String,
}

impl MoveFeatureTool {
    pub fn new(store: Arc<MemoryStore>, agent: impl Into<String>) -> Self {
        Self { store, agent: agent.into() }
    }
}

#[derive(Deserialize)]
struct MoveFeatureArgs {
    feature_id: String,
    target_goal: String,
}

#[async_trait]
impl BuiltinTool for MoveFeatureTool {
    fn name(&self) -> &str {
        "move_feature"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let args: MoveFeatureArgs = serde_json::from_value(args).map_err(|e| arg_error(e, "move_feature"))?;
        self.store.move_feature(&args.feature_id, &args.target_goal, &self.agent).await.map_err(|e| store_error(e, "move_feature"))?;
        Ok(json!({ "status": "ok" }))
    }
}

/// Construct the full memory tool set for registration (§4.3).
pub fn all(store: Arc<MemoryStore>, agent: impl Into<String> + Clone) -> Vec<Arc<dyn BuiltinTool>> {
    vec![
        Arc::new(AddGoalTool::new(store.clone(), agent.clone())),
        Arc::new(AddFeatureTool::new(store.clone(), agent.clone())),
        Arc::new(UpdateFeatureStatusTool::new(store.clone(), agent.clone())),
        Arc::new(AddTestResultTool::new(store.clone(), agent.clone())),
        Arc::new(LogProgressTool::new(store.clone(), agent.clone())),
        Arc::new(RemoveGoalTool::new(store.clone(), agent.clone())),
        Arc::new(MoveFeatureTool::new(store, agent)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn store(dir: &std::path::Path) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(dir, Uuid::nil(), "domain", "desc"))
    }

    #[tokio::test]
    async fn add_goal_then_add_feature_then_update_status() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let add_goal = AddGoalTool::new(store.clone(), "planner");
        add_goal.call(json!({"id": "g1", "description": "ship it"})).await.unwrap();

        let add_feature = AddFeatureTool::new(store.clone(), "planner");
        add_feature.call(json!({"goal_id": "g1", "id": "f1", "description": "write code"})).await.unwrap();

        let add_result = AddTestResultTool::new(store.clone(), "coder");
        add_result.call(json!({"feature_id": "f1", "test_id": "t1", "passed": true})).await.unwrap();

        let update = UpdateFeatureStatusTool::new(store.clone(), "coder");
        update.call(json!({"feature_id": "f1", "status": "completed"})).await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(snap.goals[0].features[0].status, FeatureStatus::Completed);
    }

    #[tokio::test]
    async fn update_status_rejects_completion_with_failing_test_through_the_tool() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        AddGoalTool::new(store.clone(), "a").call(json!({"id": "g1", "description": "d"})).await.unwrap();
        AddFeatureTool::new(store.clone(), "a").call(json!({"goal_id": "g1", "id": "f1", "description": "d"})).await.unwrap();
        AddTestResultTool::new(store.clone(), "a").call(json!({"feature_id": "f1", "test_id": "t1", "passed": false})).await.unwrap();

        let update = UpdateFeatureStatusTool::new(store.clone(), "a");
        let err = update.call(json!({"feature_id": "f1", "status": "completed"})).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::ArgError { .. }));
    }
}
