//! Built-in tool handler port (§4.3 "Built-in Tool Set").

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::BuiltinToolError;

/// One built-in tool's behavior, dispatched by name from the
/// `builtin.<name>` namespace (§4.1 rule d, §4.3).
#[async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Name this tool is registered under, without the `builtin.` prefix.
    fn name(&self) -> &str;

    /// Execute with validated arguments, returning the tool's JSON result.
    async fn call(&self, args: Value) -> Result<Value, BuiltinToolError>;
}
