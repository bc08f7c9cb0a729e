//! Quality Validator (§4.6): a second, usually cheaper model judges a
//! candidate result against a role-specific rubric and returns `valid` or
//! `invalid` plus feedback for the Executor's retry loop.
//!
//! Adapted from the `IntentVerifierService` (`services/
//! intent_verifier.rs`): same "ask a model to judge prior work against a
//! rubric, parse a structured verdict" shape, generalized from goal/task
//! intent-gap analysis to four role-specific rubrics, narrowed from a
//! full gap-taxonomy to a single valid/invalid verdict.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::error::ValidatorError;
use crate::domain::ports::{ChatMessage, ModelEndpoint, StreamDelta};

/// Default cap on validation-driven retries per task (§4.6).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid { feedback: String },
}

/// The rubric text for a role, matching §4.6's four named rubrics. Roles
/// outside this set are never sent to the Validator.
fn rubric_for(role: &str) -> Option<&'static str> {
    match role {
        "CODER" => Some("Judge the candidate result on: syntax correctness, security (no injected secrets, no unsafe shell/file operations), and completeness against the task description."),
        "EXECUTOR" => Some("Judge the candidate result on: whether any shell command succeeded, and completeness against the task description."),
        "PLANNER" => Some("Judge the candidate plan on: sensible decomposition, correct task ordering/flow, and coverage of the user's request."),
        "WRITER" => Some("Judge the candidate result on: the target file's existence, its content, and whether its format matches what the task asked for."),
        _ => None,
    }
}

#[derive(Deserialize)]
struct Verdict {
    valid: bool,
    #[serde(default)]
    feedback: String,
}

/// Calls the validation endpoint for configured roles and parses its
/// verdict (§4.6).
pub struct Validator {
    endpoint: std::sync::Arc<dyn ModelEndpoint>,
    enabled_roles: HashSet<String>,
    max_retries: u32,
}

impl Validator {
    pub fn new(endpoint: std::sync::Arc<dyn ModelEndpoint>, enabled_roles: impl IntoIterator<Item = String>, max_retries: u32) -> Self {
        Self { endpoint, enabled_roles: enabled_roles.into_iter().collect(), max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether `role` is configured for validation at all (§4.6 "Optional.
    /// For configured roles").
    pub fn applies_to(&self, role: &str) -> bool {
        self.enabled_roles.contains(role)
    }

    /// Judge `candidate_result` for `task_description` under `role`'s
    /// rubric. Roles with no rubric or not in `enabled_roles` are treated
    /// as always valid (validation skipped).
    pub async fn validate(&self, role: &str, task_description: &str, candidate_result: &str) -> Result<ValidationOutcome, ValidatorError> {
        if !self.applies_to(role) {
            return Ok(ValidationOutcome::Valid);
        }
        let Some(rubric) = rubric_for(role) else {
            return Ok(ValidationOutcome::Valid);
        };

        let system = format!(
            "You are a strict reviewer. {rubric} Respond with ONLY a JSON object: {{\"valid\": bool, \"feedback\": \"...\"}}. feedback is required and explanatory when valid is false, empty otherwise."
        );
        let user = format!("Task:\n{task_description}\n\nCandidate result:\n{candidate_result}");
        let messages = vec![
            ChatMessage { role: "system".to_string(), content: system },
            ChatMessage { role: "user".to_string(), content: user },
        ];

        let text = collect_text(self.endpoint.as_ref(), messages).await?;
        let verdict = parse_verdict(&text)?;

        if verdict.valid {
            Ok(ValidationOutcome::Valid)
        } else {
            Ok(ValidationOutcome::Invalid { feedback: verdict.feedback })
        }
    }
}

async fn collect_text(endpoint: &dyn ModelEndpoint, messages: Vec<ChatMessage>) -> Result<String, ValidatorError> {
    let (tx, mut rx) = mpsc::channel(32);
    endpoint
        .chat_stream(messages, None, tx)
        .await
        .map_err(|e| ValidatorError::ModelCallFailed(e.to_string()))?;

    let mut text = String::new();
    while let Some(delta) = rx.recv().await {
        match delta {
            StreamDelta::Text(chunk) => text.push_str(&chunk),
            StreamDelta::ToolCallHint { .. } => {}
            StreamDelta::Done => break,
        }
    }
    Ok(text)
}

/// Extract the first balanced `{...}` object from `text` and parse it as a
/// [`Verdict`]; validator models sometimes wrap the JSON in prose despite
/// the "ONLY a JSON object" instruction.
fn parse_verdict(text: &str) -> Result<Verdict, ValidatorError> {
    let start = text.find('{').ok_or_else(|| ValidatorError::ModelCallFailed("no JSON object in validator response".to_string()))?;
    let end = text.rfind('}').ok_or_else(|| ValidatorError::ModelCallFailed("no JSON object in validator response".to_string()))?;
    if end < start {
        return Err(ValidatorError::ModelCallFailed("malformed JSON object in validator response".to_string()));
    }
    let value: Value = serde_json::from_str(&text[start..=end]).map_err(|e| ValidatorError::ModelCallFailed(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| ValidatorError::ModelCallFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedEndpoint(&'static str);

    #[async_trait]
    impl ModelEndpoint for FixedEndpoint {
        fn id(&self) -> &str {
            "fixed"
        }
        async fn chat_stream(&self, _messages: Vec<ChatMessage>, _tools_schema: Option<Value>, tx: mpsc::Sender<StreamDelta>) -> anyhow::Result<()> {
            tx.send(StreamDelta::Text(self.0.to_string())).await.ok();
            tx.send(StreamDelta::Done).await.ok();
            Ok(())
        }
    }

    #[tokio::test]
    async fn skips_validation_for_unconfigured_role() {
        let validator = Validator::new(Arc::new(FixedEndpoint("irrelevant")), [], DEFAULT_MAX_RETRIES);
        let outcome = validator.validate("READER", "task", "result").await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn parses_a_valid_verdict() {
        let validator = Validator::new(Arc::new(FixedEndpoint(r#"{"valid": true, "feedback": ""}"#)), ["CODER".to_string()], DEFAULT_MAX_RETRIES);
        let outcome = validator.validate("CODER", "write a function", "fn f() {}").await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn parses_an_invalid_verdict_with_feedback() {
        let body = r#"Here is my assessment: {"valid": false, "feedback": "missing error handling"}"#;
        let validator = Validator::new(Arc::new(FixedEndpoint(body)), ["CODER".to_string()], DEFAULT_MAX_RETRIES);
        let outcome = validator.validate("CODER", "write a function", "fn f() {}").await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid { feedback: "missing error handling".to_string() });
    }

    #[tokio::test]
    async fn malformed_response_is_a_validator_error() {
        let validator = Validator::new(Arc::new(FixedEndpoint("not json at all")), ["CODER".to_string()], DEFAULT_MAX_RETRIES);
        let err = validator.validate("CODER", "task", "result").await.unwrap_err();
        assert!(matches!(err, ValidatorError::ModelCallFailed(_)));
    }
}
