//! Infrastructure layer: adapters for configuration, logging, MCP
//! transports, and model endpoints.

pub mod config;
pub mod llm;
pub mod logging;
pub mod mcp;
