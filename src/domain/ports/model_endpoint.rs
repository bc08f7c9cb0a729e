//! Model endpoint port — the uniform chat-style interface the Router and
//! Task Executor speak to every provider through (§6 "Model endpoints").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One message in a chat-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A streamed delta: either a text chunk or a structured tool-call hint the
/// provider returned natively (folded into the Tool Parser's input
/// alongside any free-form carriers in the text, §6).
#[derive(Debug, Clone)]
pub enum StreamDelta {
    Text(String),
    ToolCallHint { name: String, arguments: serde_json::Value },
    Done,
}

/// A uniform chat-style model endpoint: local-style (may return structured
/// tool-call hints or free-form text) or paid-cloud-style (escalation and
/// validation only).
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    /// Endpoint identity, used by the Router's histogram and by logging.
    fn id(&self) -> &str;

    /// Send a chat request and stream the response back on `tx`. Returns
    /// once the stream is exhausted or an error occurs.
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        tools_schema: Option<serde_json::Value>,
        tx: mpsc::Sender<StreamDelta>,
    ) -> anyhow::Result<()>;
}
