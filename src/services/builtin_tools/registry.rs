//! Fixed dispatch table of built-in tools, keyed by name (§4.3).
//!
//! Mirrors the `AdapterRegistry`
//! (`services/adapter_registry.rs`): a name-indexed map built once at
//! startup from a fixed list, with lookup by name rather than open-ended
//! subclassing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::error::BuiltinToolError;
use crate::domain::ports::builtin_tool::BuiltinTool;

/// Category tag used for display and for config-driven disablement by
/// category (not exposed in spec.md's `disabledTools`, but mirrors the
/// teacher's `AdapterManifest.capabilities` tagging style).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    FilesystemRead,
    FilesystemWrite,
    Shell,
    Python,
    Config,
    Memory,
    Artifact,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilesystemRead => "filesystem_read",
            Self::FilesystemWrite => "filesystem_write",
            Self::Shell => "shell",
            Self::Python => "python",
            Self::Config => "config",
            Self::Memory => "memory",
            Self::Artifact => "artifact",
        }
    }
}

/// One registered tool: its category, its JSON-schema for arguments, and
/// the handler implementation.
pub struct ToolEntry {
    pub category: ToolCategory,
    pub schema: Value,
    pub handler: Arc<dyn BuiltinTool>,
}

/// The fixed dispatch table (§4.3).
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, category: ToolCategory, schema: Value, handler: Arc<dyn BuiltinTool>) {
        let name = handler.name().to_string();
        self.entries.insert(name, ToolEntry { category, schema, handler });
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// `list_all_tools` built-in half (§4.2 covers the MCP half): ordered
    /// `(name, schema, category)` triples.
    pub fn catalog(&self) -> Vec<(&str, &Value, ToolCategory)> {
        let mut out: Vec<_> = self.entries.iter().map(|(name, e)| (name.as_str(), &e.schema, e.category)).collect();
        out.sort_by_key(|(name, _, _)| *name);
        out
    }

    pub async fn call(&self, name: &str, args: Value) -> Result<Value, BuiltinToolError> {
        let entry = self.entries.get(name).ok_or_else(|| BuiltinToolError::UnknownTool(name.to_string()))?;
        entry.handler.call(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl BuiltinTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolCategory::Shell, serde_json::json!({}), Arc::new(Echo));

        let result = registry.call("echo", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry.call("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, BuiltinToolError::UnknownTool(_)));
    }
}
