//! Paid-cloud-style model endpoint, used only for escalation and
//! validation (§6). Non-streaming request collapsed into the same
//! `StreamDelta` channel the local endpoint uses, so the Executor and
//! Validator need not distinguish providers.

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::domain::ports::model_endpoint::{ChatMessage, ModelEndpoint, StreamDelta};

pub struct CloudEndpoint {
    id: String,
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
}

impl CloudEndpoint {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { id: id.into(), base_url: base_url.into(), model: model.into(), api_key: api_key.into(), client: Client::new() }
    }
}

#[async_trait]
impl ModelEndpoint for CloudEndpoint {
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
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = response.json().await?;

        if let Some(text) = value.get("content").and_then(|c| c.get(0)).and_then(|c| c.get("text")).and_then(|v| v.as_str()) {
            tx.send(StreamDelta::Text(text.to_string())).await.ok();
        }
        tx.send(StreamDelta::Done).await.ok();
        Ok(())
    }
}
