//! Agent role definitions — a closed set of immutable configurations loaded
//! at startup (§3 `AgentDefinition`, §9 "closed set of immutable values,
//! dispatch on role name, not inheritance").
//!
//! Adapted from the `.claude/agents/*.md` YAML-frontmatter parser
//! (`domain/models/agent_definition.rs`): same frontmatter-plus-body shape,
//! generalized from "agent tier for the worker/specialist/
//! architect hierarchy" to named agent roles (PLANNER, READER,
//! CODER, EXECUTOR, AGGREGATOR, INITIALIZER, …) with per-role tool
//! categories and loop limits.

use serde::{Deserialize, Serialize};

/// A tool category a role may be permitted or forbidden to use (§4.3).
pub type ToolCategory = String;

/// Static, immutable configuration for one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub role: String,
    pub system_prompt: String,
    pub allowed_tool_categories: Vec<ToolCategory>,
    pub forbidden_tools: Vec<String>,
    pub max_context_tokens: usize,
    pub loop_limit: u32,
    pub temperature: f32,
}

impl AgentDefinition {
    /// Parse a `---\nyaml\n---\nbody` agent definition file, same shape as
    /// the `.claude/agents/*.md` format.
    pub fn parse(content: &str) -> Result<Self, String> {
        let trimmed = content.trim();
        if !trimmed.starts_with("---") {
            return Err("agent definition must start with YAML frontmatter (---)".to_string());
        }
        let after_first = &trimmed[3..];
        let closing_idx = after_first
            .find("\n---")
            .ok_or_else(|| "missing closing --- for YAML frontmatter".to_string())?;
        let yaml_str = after_first[..closing_idx].trim();
        let system_prompt = after_first[closing_idx + 4..].trim().to_string();

        #[derive(Deserialize)]
        struct Frontmatter {
            role: String,
            #[serde(default)]
            allowed_tool_categories: Vec<String>,
            #[serde(default)]
            forbidden_tools: Vec<String>,
            #[serde(default = "default_max_context")]
            max_context_tokens: usize,
            #[serde(default = "default_loop_limit")]
            loop_limit: u32,
            #[serde(default = "default_temperature")]
            temperature: f32,
        }

        fn default_max_context() -> usize {
            8_000
        }
        fn default_loop_limit() -> u32 {
            3
        }
        fn default_temperature() -> f32 {
            0.2
        }

        let fm: Frontmatter =
            serde_yaml::from_str(yaml_str).map_err(|e| format!("invalid agent frontmatter: {e}"))?;

        Ok(Self {
            role: fm.role.to_uppercase(),
            system_prompt,
            allowed_tool_categories: fm.allowed_tool_categories,
            forbidden_tools: fm.forbidden_tools,
            max_context_tokens: fm.max_context_tokens,
            loop_limit: fm.loop_limit,
            temperature: fm.temperature,
        })
    }
}

/// The built-in closed set of roles, used when no `.agents/*.md` overrides
/// are configured. Mirrors the scenarios in spec.md §8 (PLANNER, READER,
/// CODER, EXECUTOR, AGGREGATOR) plus INITIALIZER (§4.4 session bootstrap).
pub fn builtin_roles() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            role: "PLANNER".to_string(),
            system_prompt: "Decompose the user's query into a JSON task plan.".to_string(),
            allowed_tool_categories: vec!["filesystem_read".to_string()],
            forbidden_tools: vec![],
            max_context_tokens: 16_000,
            loop_limit: 2,
            temperature: 0.1,
        },
        AgentDefinition {
            role: "INITIALIZER".to_string(),
            system_prompt: "Bootstrap a fresh project's Goals and Features as JSON.".to_string(),
            allowed_tool_categories: vec!["filesystem_read".to_string()],
            forbidden_tools: vec![],
            max_context_tokens: 16_000,
            loop_limit: 1,
            temperature: 0.1,
        },
        AgentDefinition {
            role: "READER".to_string(),
            system_prompt: "Answer the task using read-only filesystem tools.".to_string(),
            allowed_tool_categories: vec!["filesystem_read".to_string()],
            forbidden_tools: vec![],
            max_context_tokens: 8_000,
            loop_limit: 3,
            temperature: 0.2,
        },
        AgentDefinition {
            role: "CODER".to_string(),
            system_prompt: "Write or modify code to satisfy the task.".to_string(),
            allowed_tool_categories: vec![
                "filesystem_read".to_string(),
                "filesystem_write".to_string(),
                "python".to_string(),
            ],
            forbidden_tools: vec![],
            max_context_tokens: 12_000,
            loop_limit: 5,
            temperature: 0.3,
        },
        AgentDefinition {
            role: "EXECUTOR".to_string(),
            system_prompt: "Carry out the task using any available tool.".to_string(),
            allowed_tool_categories: vec![
                "filesystem_read".to_string(),
                "filesystem_write".to_string(),
                "shell".to_string(),
                "python".to_string(),
                "memory".to_string(),
            ],
            forbidden_tools: vec![],
            max_context_tokens: 12_000,
            loop_limit: 4,
            temperature: 0.2,
        },
        AgentDefinition {
            role: "AGGREGATOR".to_string(),
            system_prompt: "Synthesize per-task outputs into the final user-visible answer.".to_string(),
            allowed_tool_categories: vec![],
            forbidden_tools: vec![],
            max_context_tokens: 16_000,
            loop_limit: 1,
            temperature: 0.3,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_and_body() {
        let content = "---\nrole: reader\nloop_limit: 4\n---\n\nYou read files.";
        let def = AgentDefinition::parse(content).unwrap();
        assert_eq!(def.role, "READER");
        assert_eq!(def.loop_limit, 4);
        assert_eq!(def.system_prompt, "You read files.");
    }

    #[test]
    fn rejects_missing_frontmatter() {
        assert!(AgentDefinition::parse("no frontmatter here").is_err());
    }

    #[test]
    fn builtin_roles_cover_spec_scenarios() {
        let roles: Vec<String> = builtin_roles().into_iter().map(|d| d.role).collect();
        for expected in ["PLANNER", "READER", "EXECUTOR", "AGGREGATOR"] {
            assert!(roles.contains(&expected.to_string()));
        }
    }
}
