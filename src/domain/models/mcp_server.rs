//! MCP server configuration and connection-state domain model (§3, §4.2).

use serde::{Deserialize, Serialize};

/// Which transport an MCP server speaks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "transport")]
pub enum TransportKind {
    /// Child process, newline-delimited JSON-RPC over stdin/stdout.
    Stdio { command: String, #[serde(default)] args: Vec<String> },
    /// HTTP GET for the stream, HTTP POST for requests.
    Sse { url: String },
    /// HTTP POST per request, chunked streaming JSON-RPC responses.
    StreamingHttp { url: String },
}

/// Static configuration for one MCP server (§6 `mcpServers` config key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Discovered tool metadata from a server's `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub category: String,
}

/// Runtime connection state for one configured MCP server (§3 `MCPServer`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct MCPServer {
    pub config: McpServerConfig,
    pub state: ConnectionState,
    pub discovered_tools: Vec<ToolInfo>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl MCPServer {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            discovered_tools: Vec::new(),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, detail: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(detail.into());
        self.state = ConnectionState::Degraded;
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
        self.state = ConnectionState::Connected;
    }
}
