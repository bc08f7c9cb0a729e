//! MCP client multiplexer (§4.2): one connection per configured server,
//! uniform `list_tools` / `call_tool` surface, per-server health tracking.
//!
//! Grounded in the `McpClientImpl` (`infrastructure/mcp/client.rs`):
//! same JSON-RPC request/response shape and `tracing` instrumentation, but
//! generalized from a single stdio-only server manager to a map of
//! transport-agnostic connections (§6: stdio, SSE, streaming HTTP) with
//! exponential backoff reconnect (§4.2) via the `backoff` crate instead of
//! the restart-on-crash health monitor.

use std::collections::HashMap;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::domain::error::McpError;
use crate::domain::models::mcp_server::{ConnectionState, MCPServer, McpServerConfig, ToolInfo};
use crate::domain::ports::McpTransport;

/// One server's connection slot: config/state plus its transport, if
/// connected. The transport is owned here — **never** handed to another
/// scheduling context for teardown (§4.2 cleanup anti-pattern, §9).
struct Slot {
    server: MCPServer,
    transport: Option<Mutex<Box<dyn McpTransport>>>,
}

/// Constructs a transport for a server config. Implemented by
/// `infrastructure::mcp` and injected so the multiplexer stays
/// transport-agnostic and unit-testable with fakes.
pub trait TransportFactory: Send + Sync {
    fn build(&self, config: &McpServerConfig) -> Box<dyn McpTransport>;
}

/// Default per-call timeout (§4.2 "Enforces the configured per-call
/// timeout").
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct McpMultiplexer {
    slots: HashMap<String, Slot>,
    factory: Box<dyn TransportFactory>,
    call_timeout: Duration,
}

impl McpMultiplexer {
    pub fn new(configs: Vec<McpServerConfig>, factory: Box<dyn TransportFactory>) -> Self {
        let slots = configs
            .into_iter()
            .filter(|c| c.enabled)
            .map(|c| {
                (
                    c.name.clone(),
                    Slot { server: MCPServer::new(c), transport: None },
                )
            })
            .collect();
        Self { slots, factory, call_timeout: DEFAULT_CALL_TIMEOUT }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Idempotent; returns once a connected transport exists for `server`,
    /// reconnecting with exponential backoff on the last recorded failure
    /// (§4.2).
    pub async fn ensure_connected(&mut self, server: &str) -> Result<(), McpError> {
        let slot = self
            .slots
            .get_mut(server)
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?;

        if let Some(transport) = &slot.transport {
            if transport.lock().await.is_connected() {
                return Ok(());
            }
        }

        slot.server.state = ConnectionState::Connecting;
        let mut transport = self.factory.build(&slot.server.config);
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(Duration::from_secs(30)))
            .build();

        loop {
            match transport.connect().await {
                Ok(()) => {
                    slot.server.record_success();
                    slot.server.discovered_tools = transport.tools().to_vec();
                    slot.transport = Some(Mutex::new(transport));
                    tracing::info!(server = %server, "MCP server connected");
                    return Ok(());
                }
                Err(e) => {
                    slot.server.record_failure(e.to_string());
                    match backoff.next_backoff() {
                        Some(delay) => {
                            tracing::warn!(server = %server, error = %e, delay_ms = delay.as_millis() as u64, "MCP connect failed, retrying");
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    /// Ordered `(server, tool name, schema, category)` across all connected
    /// servers. Cached on the `MCPServer` slot; `reload()` invalidates.
    pub fn list_all_tools(&self) -> Vec<(String, ToolInfo)> {
        let mut out: Vec<(String, ToolInfo)> = self
            .slots
            .values()
            .flat_map(|slot| {
                slot.server
                    .discovered_tools
                    .iter()
                    .map(move |t| (slot.server.config.name.clone(), t.clone()))
            })
            .collect();
        out.sort_by(|a, b| (a.0.as_str(), a.1.name.as_str()).cmp(&(b.0.as_str(), b.1.name.as_str())));
        out
    }

    /// Call `server.tool`. May suspend to connect. Enforces the per-call
    /// timeout (§4.2).
    pub async fn call_tool(&mut self, server: &str, tool: &str, args: Value) -> Result<Value, McpError> {
        self.ensure_connected(server).await?;
        let slot = self.slots.get_mut(server).expect("just ensured connected");
        let transport = slot.transport.as_ref().expect("just ensured connected");
        let guard = transport.lock().await;

        match timeout(self.call_timeout, guard.call_tool(tool, args)).await {
            Ok(Ok(value)) => {
                slot.server.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                slot.server.record_failure(e.to_string());
                Err(e)
            }
            Err(_elapsed) => {
                let err = McpError::Timeout {
                    server: server.to_string(),
                    tool: tool.to_string(),
                    secs: self.call_timeout.as_secs(),
                };
                slot.server.record_failure(err.to_string());
                Err(err)
            }
        }
    }

    /// Disconnect all, rebuild catalogs. Does not terminate the owning
    /// session (§4.2). In-flight calls complete against the old catalog
    /// (§9 open question resolution).
    pub async fn reload(&mut self) -> Result<(), McpError> {
        let names: Vec<String> = self.slots.keys().cloned().collect();
        for name in &names {
            if let Some(slot) = self.slots.get_mut(name) {
                if let Some(transport) = slot.transport.take() {
                    transport.into_inner().disconnect().await;
                }
                slot.server.state = ConnectionState::Disconnected;
            }
        }
        for name in &names {
            self.ensure_connected(name).await?;
        }
        Ok(())
    }

    pub fn server_state(&self, server: &str) -> Option<ConnectionState> {
        self.slots.get(server).map(|s| s.server.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::mcp_server::TransportKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FakeTransport {
        connected: bool,
        fail_connects: Arc<AtomicU32>,
    }

    #[async_trait]
    impl McpTransport for FakeTransport {
        async fn connect(&mut self) -> Result<(), McpError> {
            if self.fail_connects.load(Ordering::SeqCst) > 0 {
                self.fail_connects.fetch_sub(1, Ordering::SeqCst);
                return Err(McpError::TransportError {
                    server: "fake".to_string(),
                    detail: "simulated".to_string(),
                });
            }
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        fn tools(&self) -> &[ToolInfo] {
            &[]
        }

        async fn call_tool(&self, _tool: &str, args: Value) -> Result<Value, McpError> {
            Ok(args)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    struct FakeFactory {
        fail_connects: Arc<AtomicU32>,
    }

    impl TransportFactory for FakeFactory {
        fn build(&self, _config: &McpServerConfig) -> Box<dyn McpTransport> {
            Box::new(FakeTransport { connected: false, fail_connects: self.fail_connects.clone() })
        }
    }

    fn config(name: &str) -> McpServerConfig {
        McpServerConfig {
            name: name.to_string(),
            transport: TransportKind::Stdio { command: "echo".to_string(), args: vec![] },
            enabled: true,
        }
    }

    #[tokio::test]
    async fn unknown_server_is_an_error() {
        let mut mux = McpMultiplexer::new(vec![], Box::new(FakeFactory { fail_connects: Arc::new(AtomicU32::new(0)) }));
        let err = mux.ensure_connected("nope").await.unwrap_err();
        assert!(matches!(err, McpError::UnknownServer(_)));
    }

    #[tokio::test]
    async fn call_tool_round_trips_through_fake_transport() {
        let mut mux = McpMultiplexer::new(
            vec![config("fake")],
            Box::new(FakeFactory { fail_connects: Arc::new(AtomicU32::new(0)) }),
        );
        let result = mux.call_tool("fake", "echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn reconnects_after_transient_failure() {
        let fail_connects = Arc::new(AtomicU32::new(1));
        let mut mux = McpMultiplexer::new(
            vec![config("fake")],
            Box::new(FakeFactory { fail_connects: fail_connects.clone() }),
        );
        mux.ensure_connected("fake").await.unwrap();
        assert_eq!(mux.server_state("fake"), Some(ConnectionState::Connected));
    }

    #[tokio::test]
    async fn a_failed_server_does_not_affect_others() {
        let mut mux = McpMultiplexer::new(
            vec![config("a"), config("b")],
            Box::new(FakeFactory { fail_connects: Arc::new(AtomicU32::new(0)) }),
        );
        mux.ensure_connected("a").await.unwrap();
        mux.ensure_connected("b").await.unwrap();
        assert_eq!(mux.server_state("a"), Some(ConnectionState::Connected));
        assert_eq!(mux.server_state("b"), Some(ConnectionState::Connected));
    }
}
