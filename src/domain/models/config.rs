//! Recognized configuration keys (§6 "Configuration", §4.0 [NEW]).
//!
//! Adapted from the `domain/models/config.rs` `Config` struct
//! (flat, section-per-concern, all `#[serde(default)]`): same shape,
//! sections swapped for the delegation engine's domain (MCP servers, model
//! pool, delegation/validation/escalation/memory policy) in place of the
//! teacher's swarm-limits sections.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::mcp_server::McpServerConfig;
use super::model_pool::ModelPoolEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(rename = "disabledTools")]
    pub disabled_tools: Vec<String>,
    #[serde(rename = "disabledServers")]
    pub disabled_servers: Vec<String>,
    #[serde(rename = "modelPool")]
    pub model_pool: Vec<ModelPoolEntry>,
    #[serde(rename = "agentModels")]
    pub agent_models: HashMap<String, String>,
    pub delegation: DelegationConfig,
    pub validation: ValidationConfig,
    pub escalation: EscalationConfig,
    pub memory: MemoryConfig,
    #[serde(rename = "sessionTimeout")]
    pub session_timeout_minutes: u64,
    pub logging: LogConfig,
    /// Root directory the filesystem/shell built-in tools are confined to.
    /// Defaults to the current working directory when unset (§4.3
    /// "Filesystem tools... resolve relative to a workspace root").
    #[serde(rename = "workspaceRoot")]
    pub workspace_root: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mcp_servers: Vec::new(),
            disabled_tools: Vec::new(),
            disabled_servers: Vec::new(),
            model_pool: Vec::new(),
            agent_models: HashMap::new(),
            delegation: DelegationConfig::default(),
            validation: ValidationConfig::default(),
            escalation: EscalationConfig::default(),
            memory: MemoryConfig::default(),
            session_timeout_minutes: 30,
            logging: LogConfig::default(),
            workspace_root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    pub enabled: bool,
    pub loop_limit_overrides: HashMap<String, u32>,
    pub plan_mode: bool,
    pub max_tasks: usize,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            loop_limit_overrides: HashMap::new(),
            plan_mode: true,
            max_tasks: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub validate_roles: Vec<String>,
    pub max_retries: u32,
    pub validation_model: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validate_roles: vec!["CODER".to_string(), "EXECUTOR".to_string()],
            max_retries: 3,
            validation_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub api_key_ref: Option<String>,
    pub threshold: u32,
    pub rate_limit: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            api_key_ref: None,
            threshold: 2,
            rate_limit: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub storage_dir: String,
    pub default_domain: String,
    pub auto_persist: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_dir: ".delegate/memory".to_string(),
            default_domain: "default".to_string(),
            auto_persist: true,
        }
    }
}

/// Structured-logging configuration (§2 [NEW] "Structured logging"),
/// adapted from the `infrastructure/logging/config.rs` `LogConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub log_dir: Option<std::path::PathBuf>,
    pub enable_stdout: bool,
    pub rotation: RotationPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}
