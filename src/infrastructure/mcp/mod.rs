//! MCP transport implementations (§6).

pub mod http_transport;
pub mod stdio_transport;

use crate::domain::models::mcp_server::{McpServerConfig, TransportKind};
use crate::domain::ports::McpTransport;
use crate::services::mcp::multiplexer::TransportFactory;

pub use http_transport::{SseTransport, StreamingHttpTransport};
pub use stdio_transport::StdioTransport;

/// Builds the right transport for a server's configured `TransportKind`.
pub struct RealTransportFactory;

impl TransportFactory for RealTransportFactory {
    fn build(&self, config: &McpServerConfig) -> Box<dyn McpTransport> {
        match &config.transport {
            TransportKind::Stdio { command, args } => {
                Box::new(StdioTransport::new(config.name.clone(), command.clone(), args.clone()))
            }
            TransportKind::Sse { url } => Box::new(SseTransport::new(config.name.clone(), url.clone())),
            TransportKind::StreamingHttp { url } => {
                Box::new(StreamingHttpTransport::new(config.name.clone(), url.clone()))
            }
        }
    }
}
