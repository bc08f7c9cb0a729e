//! stdio MCP transport: a child process speaking newline-delimited JSON-RPC
//! 2.0 over stdin/stdout (§6 "MCP transports").
//!
//! Grounded in the `StdioTransport` (`infrastructure/mcp/
//! server_manager.rs`): request/response correlation by JSON-RPC `id` over
//! a spawned `tokio::process::Child`. Process teardown uses `nix::sys::
//! signal` rather than the restart-on-crash health monitor, since
//! this transport's lifetime is scoped to its owning session (§4.2, §9).

use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::domain::error::McpError;
use crate::domain::models::mcp_server::ToolInfo;
use crate::domain::ports::McpTransport;

pub struct StdioTransport {
    server_name: String,
    command: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<Mutex<ChildStdin>>,
    stdout: Option<Mutex<BufReader<ChildStdout>>>,
    tools: Vec<ToolInfo>,
    next_id: std::sync::atomic::AtomicU64,
}

impl StdioTransport {
    pub fn new(server_name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            server_name: server_name.into(),
            command: command.into(),
            args,
            child: None,
            stdin: None,
            stdout: None,
            tools: Vec::new(),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn transport_err(&self, detail: impl Into<String>) -> McpError {
        McpError::TransportError { server: self.server_name.clone(), detail: detail.into() }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let stdin = self.stdin.as_ref().ok_or_else(|| self.transport_err("not connected"))?;
        let stdout = self.stdout.as_ref().ok_or_else(|| self.transport_err("not connected"))?;

        {
            let mut stdin = stdin.lock().await;
            let mut line = serde_json::to_string(&request).map_err(|e| self.transport_err(e.to_string()))?;
            line.push('\n');
            stdin.write_all(line.as_bytes()).await.map_err(|e| self.transport_err(e.to_string()))?;
        }

        let mut stdout = stdout.lock().await;
        loop {
            let mut buf = String::new();
            let n = stdout.read_line(&mut buf).await.map_err(|e| self.transport_err(e.to_string()))?;
            if n == 0 {
                return Err(self.transport_err("server closed stdout"));
            }
            let Ok(response) = serde_json::from_str::<Value>(buf.trim()) else {
                continue; // ignore non-JSON-RPC noise on stdout
            };
            if response.get("id").and_then(Value::as_u64) != Some(id) {
                continue; // correlator: skip frames for other in-flight requests
            }
            if let Some(error) = response.get("error") {
                return Err(McpError::ToolServerError {
                    server: self.server_name.clone(),
                    tool: method.to_string(),
                    detail: error.to_string(),
                });
            }
            return Ok(response.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&mut self) -> Result<(), McpError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.transport_err(format!("spawn failed: {e}")))?;

        let stdin = child.stdin.take().ok_or_else(|| self.transport_err("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| self.transport_err("no stdout"))?;
        self.stdin = Some(Mutex::new(stdin));
        self.stdout = Some(Mutex::new(BufReader::new(stdout)));
        self.child = Some(child);

        self.request("initialize", serde_json::json!({})).await?;
        let result = self.request("tools/list", serde_json::json!({})).await?;
        self.tools = result
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
            .unwrap_or_default();
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Some(id) = child.id() {
                let _ = signal::kill(Pid::from_raw(id as i32), Signal::SIGTERM);
            }
            let _ = child.wait().await;
        }
    }

    fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, McpError> {
        self.request("tools/call", serde_json::json!({ "name": tool, "arguments": args })).await
    }

    fn is_connected(&self) -> bool {
        self.child.is_some()
    }
}
