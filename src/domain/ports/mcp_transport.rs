//! MCP transport port (§4.2 "MCP Client Multiplexer").
//!
//! Generalizes the `McpClient` (stdio-only, fixed method set) into
//! a per-server transport abstraction so the multiplexer can hold stdio,
//! SSE, and streaming-HTTP servers behind one interface and reconnect each
//! independently on failure.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::McpError;
use crate::domain::models::mcp_server::ToolInfo;

/// A single MCP server connection, regardless of wire transport.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Perform the MCP handshake and populate the tool catalog.
    async fn connect(&mut self) -> Result<(), McpError>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&mut self);

    /// Tools this server currently advertises.
    fn tools(&self) -> &[ToolInfo];

    /// Invoke a tool by name with JSON arguments.
    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, McpError>;

    /// True once `connect` has succeeded and no fatal error has occurred
    /// since (§4.2: reconnect-with-backoff only applies while this is false).
    fn is_connected(&self) -> bool;
}
