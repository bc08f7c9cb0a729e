//! Built-in Tool Registry (§4.3): fixed dispatch table plus the handler
//! implementations grouped by category.

pub mod artifact_tools;
pub mod config_tools;
pub mod exec_tools;
pub mod fs_tools;
pub mod memory_tools;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use crate::services::memory_store::MemoryStore;

use registry::{ToolCategory, ToolRegistry};

/// Assemble the full built-in tool set (§4.3) into one [`ToolRegistry`].
/// `workspace_root` bounds filesystem tools; `memory` is the session's
/// memory store; `agent` labels progress-log entries made through memory
/// tools.
pub fn build_registry(workspace_root: impl Into<PathBuf>, memory: Arc<MemoryStore>, agent: impl Into<String> + Clone) -> ToolRegistry {
    let workspace_root = workspace_root.into();
    let mut registry = ToolRegistry::new();

    for tool in fs_tools::all(workspace_root.clone()) {
        let category = match tool.name() {
            "write_file" | "patch_file" => ToolCategory::FilesystemWrite,
            _ => ToolCategory::FilesystemRead,
        };
        registry.register(category, serde_json::json!({}), tool);
    }
    for tool in exec_tools::all(workspace_root.clone()) {
        let category = if tool.name() == "python" { ToolCategory::Python } else { ToolCategory::Shell };
        registry.register(category, serde_json::json!({}), tool);
    }
    for tool in memory_tools::all(memory.clone(), agent) {
        registry.register(ToolCategory::Memory, serde_json::json!({}), tool);
    }
    for tool in config_tools::all(workspace_root.join(".delegate/config.yaml")) {
        registry.register(ToolCategory::Config, serde_json::json!({}), tool);
    }
    for tool in artifact_tools::all(memory.artifacts_dir()) {
        registry.register(ToolCategory::Artifact, serde_json::json!({}), tool);
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn registry_contains_every_documented_handler() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemoryStore::new(dir.path(), Uuid::nil(), "domain", "desc"));
        let registry = build_registry(dir.path(), memory, "tester");

        for name in ["read_file", "patch_file", "write_file", "bash", "python", "run_pytest", "add_goal", "add_feature", "update_feature_status", "add_test_result", "log_progress", "remove_goal", "move_feature", "get_config", "save_config", "emit_artifact"] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
    }
}
