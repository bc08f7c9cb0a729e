//! Domain ports (interfaces) for the delegation engine.

pub mod builtin_tool;
pub mod mcp_transport;
pub mod model_endpoint;
pub mod task_runner;

pub use builtin_tool::BuiltinTool;
pub use mcp_transport::McpTransport;
pub use model_endpoint::{ChatMessage, ModelEndpoint, StreamDelta};
pub use task_runner::TaskRunner;
