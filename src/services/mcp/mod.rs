//! MCP client multiplexer service (§4.2).

pub mod multiplexer;

pub use multiplexer::{McpMultiplexer, TransportFactory};
