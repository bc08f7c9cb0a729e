//! Local-style model endpoint: an OpenAI-compatible chat-completions HTTP
//! API that may return structured tool-call hints or free-form text
//! containing them (§6).
//!
//! No teacher file speaks to a model endpoint directly (abathur calls
//! Claude through a CLI substrate, `infrastructure/substrates/claude_code.rs`);
//! this adapts the `reqwest`-based request/response + `tracing`
//! instrumentation style from `infrastructure/mcp/client.rs` onto a chat
//! streaming endpoint instead of JSON-RPC.

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::domain::ports::model_endpoint::{ChatMessage, ModelEndpoint, StreamDelta};

pub struct LocalEndpoint {
    id: String,
    base_url: String,
    model: String,
    client: Client,
}

impl LocalEndpoint {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { id: id.into(), base_url: base_url.into(), model: model.into(), client: Client::new() }
    }
}

#[async_trait]
impl ModelEndpoint for LocalEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        tools_schema: Option<serde_json::Value>,
        tx: mpsc::Sender<StreamDelta>,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "tools": tools_schema,
            "stream": true,
        });

        let response = self.client.post(format!("{}/v1/chat/completions", self.base_url)).json(&body).send().await?;
        let text = response.text().await?;

        // Server-sent "data: {...}" lines, same shape OpenAI-compatible
        // local servers (llama.cpp, Ollama, vLLM) emit.
        for line in text.lines() {
            let Some(payload) = line.strip_prefix("data: ") else { continue };
            if payload.trim() == "[DONE]" {
                break;
            }
            let Ok(chunk) = serde_json::from_str::<serde_json::Value>(payload) else { continue };
            if let Some(content) =
                chunk.get("choices").and_then(|c| c.get(0)).and_then(|c| c.get("delta")).and_then(|d| d.get("content")).and_then(|v| v.as_str())
            {
                tx.send(StreamDelta::Text(content.to_string())).await.ok();
            }
            if let Some(calls) =
                chunk.get("choices").and_then(|c| c.get(0)).and_then(|c| c.get("delta")).and_then(|d| d.get("tool_calls")).and_then(|v| v.as_array())
            {
                for call in calls {
                    if let (Some(name), Some(arguments)) =
                        (call.get("function").and_then(|f| f.get("name")).and_then(|v| v.as_str()), call.get("function").and_then(|f| f.get("arguments")))
                    {
                        let arguments = match arguments {
                            serde_json::Value::String(s) => serde_json::from_str(s).unwrap_or(serde_json::Value::Null),
                            other => other.clone(),
                        };
                        tx.send(StreamDelta::ToolCallHint { name: name.to_string(), arguments }).await.ok();
                    }
                }
            }
        }
        tx.send(StreamDelta::Done).await.ok();
        Ok(())
    }
}
