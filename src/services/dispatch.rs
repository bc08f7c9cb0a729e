//! Tool dispatch: resolves a parsed [`ToolCall`]'s fully-qualified name to
//! either the built-in registry or the MCP multiplexer and executes it
//! (§4.1 rule d, §4.2, §4.3).
//!
//! A dotted name (`server.tool`) binds to that MCP server; an undotted name
//! resolves against built-ins. `disabledTools`/`disabledServers` (§6) are
//! enforced here, before either path is invoked.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::error::{DelegationError, ToolDispatchError};
use crate::domain::models::tool_call::ToolCall;
use crate::services::builtin_tools::registry::ToolRegistry;
use crate::services::mcp::multiplexer::McpMultiplexer;

/// Sentinel prefix the Executor recognizes on a tool result so a server-side
/// error can be fed back to the model as context rather than aborting the
/// task (§4.2 "surfaced as a text result prefixed with an error sentinel").
pub const ERROR_SENTINEL: &str = "[tool_error]";

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    mcp: Arc<Mutex<McpMultiplexer>>,
    disabled_tools: Vec<String>,
    disabled_servers: Vec<String>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, mcp: Arc<Mutex<McpMultiplexer>>, disabled_tools: Vec<String>, disabled_servers: Vec<String>) -> Self {
        Self { registry, mcp, disabled_tools, disabled_servers }
    }

    /// Execute `call`, returning a string result suitable for appending to
    /// the conversation (built-in results and MCP results are both
    /// serialized to a JSON string; a server-side tool error is prefixed
    /// with [`ERROR_SENTINEL`] instead of propagated as a hard error).
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String, DelegationError> {
        let (server_or_builtin, tool) = call.split_name();

        if server_or_builtin == "builtin" {
            if self.is_tool_disabled("builtin", tool) {
                return Err(ToolDispatchError::ToolNotFound(call.name.clone()).into());
            }
            let result = self.registry.call(tool, call.arguments.clone()).await?;
            return Ok(result_to_string(&result));
        }

        if self.disabled_servers.iter().any(|s| s == server_or_builtin) || self.is_tool_disabled(server_or_builtin, tool) {
            return Err(ToolDispatchError::ToolNotFound(call.name.clone()).into());
        }

        let mut mux = self.mcp.lock().await;
        match mux.call_tool(server_or_builtin, tool, call.arguments.clone()).await {
            Ok(value) => Ok(result_to_string(&value)),
            Err(e) => Ok(format!("{ERROR_SENTINEL} {e}")),
        }
    }

    fn is_tool_disabled(&self, server_or_builtin: &str, tool: &str) -> bool {
        let qualified = format!("{server_or_builtin}.{tool}");
        self.disabled_tools.iter().any(|t| t == tool || t == &qualified)
    }
}

fn result_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::mcp_server::McpServerConfig;
    use crate::domain::models::tool_call::ByteRange;
    use crate::services::builtin_tools::registry::ToolCategory;
    use crate::services::mcp::multiplexer::TransportFactory;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl crate::domain::ports::builtin_tool::BuiltinTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn call(&self, args: Value) -> Result<Value, crate::domain::error::BuiltinToolError> {
            Ok(args)
        }
    }

    struct NullFactory;
    impl TransportFactory for NullFactory {
        fn build(&self, _config: &McpServerConfig) -> Box<dyn crate::domain::ports::McpTransport> {
            unreachable!("not exercised by builtin-only tests")
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall { name: name.to_string(), arguments: json!({"a": 1}), origin: ByteRange::new(0, 0) }
    }

    #[tokio::test]
    async fn dispatches_builtin_tool_by_bare_name() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolCategory::Shell, json!({}), Arc::new(Echo));
        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = ToolDispatcher::new(Arc::new(registry), mux, vec![], vec![]);

        let result = dispatcher.dispatch(&call("echo")).await.unwrap();
        assert_eq!(result, json!({"a": 1}).to_string());
    }

    #[tokio::test]
    async fn disabled_tool_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolCategory::Shell, json!({}), Arc::new(Echo));
        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = ToolDispatcher::new(Arc::new(registry), mux, vec!["echo".to_string()], vec![]);

        let err = dispatcher.dispatch(&call("echo")).await.unwrap_err();
        assert!(matches!(err, DelegationError::Dispatch(ToolDispatchError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn disabled_server_is_rejected() {
        let registry = ToolRegistry::new();
        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = ToolDispatcher::new(Arc::new(registry), mux, vec![], vec!["srv".to_string()]);

        let err = dispatcher.dispatch(&call("srv.tool")).await.unwrap_err();
        assert!(matches!(err, DelegationError::Dispatch(ToolDispatchError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_mcp_server_surfaces_as_dispatch_error() {
        let registry = ToolRegistry::new();
        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = ToolDispatcher::new(Arc::new(registry), mux, vec![], vec![]);

        // unconfigured server -> McpError::UnknownServer from the
        // multiplexer, surfaced as an in-band error sentinel, not a hard
        // failure, so the executor's retry loop can react to it.
        let result = dispatcher.dispatch(&call("ghost.tool")).await.unwrap();
        assert!(result.starts_with(ERROR_SENTINEL));
    }
}
