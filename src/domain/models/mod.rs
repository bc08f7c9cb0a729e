//! Domain models for the delegation engine.

pub mod agent_definition;
pub mod artifact;
pub mod config;
pub mod dag;
pub mod feature;
pub mod goal;
pub mod mcp_server;
pub mod memory;
pub mod model_pool;
pub mod plan;
pub mod progress;
pub mod session;
pub mod task;
pub mod tool_call;

pub use agent_definition::AgentDefinition;
pub use artifact::{Artifact, ArtifactExecution, ArtifactKind};
pub use config::{Config, DelegationConfig, EscalationConfig, LogConfig, MemoryConfig, ValidationConfig};
pub use dag::TaskDag;
pub use feature::{Feature, FeatureStatus, TestResult};
pub use goal::{Goal, GoalStatus};
pub use mcp_server::{MCPServer, McpServerConfig, TransportKind};
pub use memory::DomainMemory;
pub use model_pool::{ModelPoolEntry, RoleRequirements};
pub use plan::{Plan, RawPlan, RawTask};
pub use progress::ProgressEntry;
pub use session::Session;
pub use task::{Task, TaskStatus, TaskTier};
pub use tool_call::ToolCall;
