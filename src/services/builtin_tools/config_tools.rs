//! Config built-in tools (§4.3 `config` category): `get_config` and
//! `save_config`, backed by [`ConfigLoader`] so `save_config` preserves
//! unknown keys exactly the way spec.md §6 ("MUST merge … never replace")
//! requires.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::error::BuiltinToolError;
use crate::domain::ports::builtin_tool::BuiltinTool;
use crate::infrastructure::config::ConfigLoader;

pub struct GetConfigTool {
    path: PathBuf,
}

impl GetConfigTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BuiltinTool for GetConfigTool {
    fn name(&self) -> &str {
        "get_config"
    }

    async fn call(&self, _args: Value) -> Result<Value, BuiltinToolError> {
        let config = ConfigLoader::load_from_file(&self.path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        serde_json::to_value(config).map_err(|e| BuiltinToolError::Io(e.to_string()))
    }
}

pub struct SaveConfigTool {
    path: PathBuf,
}

impl SaveConfigTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BuiltinTool for SaveConfigTool {
    fn name(&self) -> &str {
        "save_config"
    }

    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
        let mut config = ConfigLoader::load_from_file(&self.path).unwrap_or_default();

        if let Some(model) = args.get("selected_model").and_then(|v| v.as_str()) {
            config.agent_models.insert("default".to_string(), model.to_string());
        }
        if let Some(timeout) = args.get("session_timeout_minutes").and_then(|v| v.as_u64()) {
            config.session_timeout_minutes = timeout;
        }

        ConfigLoader::save(&config, &self.path).map_err(|e| BuiltinToolError::Io(e.to_string()))?;
        Ok(json!({ "status": "ok" }))
    }
}

/// Construct the full config tool set for registration (§4.3).
pub fn all(path: impl Into<PathBuf> + Clone) -> Vec<Arc<dyn BuiltinTool>> {
    vec![Arc::new(GetConfigTool::new(path.clone())), Arc::new(SaveConfigTool::new(path))]
}
