//! Planner (§4.7): an elevated-context role that decomposes a user query
//! into a strict JSON task plan, prompted with the top-K few-shot examples
//! scored by keyword overlap with the query.
//!
//! Adapted from the `llm_planner.rs` (prompts a model for a task
//! breakdown and parses its JSON output) generalized to the `RawPlan`
//! shape and the keyword-overlap few-shot selection §4.7 names.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::error::PlannerError;
use crate::domain::models::plan::RawPlan;
use crate::domain::ports::{ChatMessage, ModelEndpoint, StreamDelta};

/// Default number of few-shot examples prepended to the Planner prompt.
pub const DEFAULT_TOP_K: usize = 2;

/// One few-shot example: a past user query plus the plan it should produce.
#[derive(Debug, Clone)]
pub struct FewShotExample {
    pub query: String,
    pub plan_json: String,
}

fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Count of keywords shared between `query` and `example` (§4.7 "scored by
/// keyword overlap with the user query").
fn overlap_score(query_keywords: &HashSet<String>, example_query: &str) -> usize {
    let example_keywords = keywords(example_query);
    query_keywords.intersection(&example_keywords).count()
}

pub struct Planner {
    endpoint: Arc<dyn ModelEndpoint>,
    examples: Vec<FewShotExample>,
    top_k: usize,
}

impl Planner {
    pub fn new(endpoint: Arc<dyn ModelEndpoint>, examples: Vec<FewShotExample>, top_k: usize) -> Self {
        Self { endpoint, examples, top_k: top_k.max(1) }
    }

    /// The top-K examples for `query`, ranked by keyword overlap, ties
    /// broken by original order.
    fn select_examples(&self, query: &str) -> Vec<&FewShotExample> {
        let query_keywords = keywords(query);
        let mut scored: Vec<(usize, usize, &FewShotExample)> = self
            .examples
            .iter()
            .enumerate()
            .map(|(idx, ex)| (overlap_score(&query_keywords, &ex.query), idx, ex))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(self.top_k).map(|(_, _, ex)| ex).collect()
    }

    fn build_prompt(&self, query: &str) -> Vec<ChatMessage> {
        let mut system = String::from(
            "Decompose the user's request into a strict JSON task plan of the shape:\n\
             { \"tasks\": [ { \"id\":\"task_1\", \"description\":\"…\", \"agent_type\":\"READER\", \"dependencies\":[] }, … ] }\n\
             Use at most 12 tasks. Inline any data a later task needs from an earlier one directly into that task's description. \
             Respond with ONLY the JSON object, no prose.",
        );
        for example in self.select_examples(query) {
            system.push_str(&format!("\n\nExample query: {}\nExample plan: {}", example.query, example.plan_json));
        }
        vec![
            ChatMessage { role: "system".to_string(), content: system },
            ChatMessage { role: "user".to_string(), content: query.to_string() },
        ]
    }

    /// Produce a [`RawPlan`] for `query` (§4.7). Parsing is strict: a
    /// non-JSON or schema-mismatched response is a [`PlannerError`], not
    /// silently recovered — the caller (Executor/Scheduler path) decides
    /// whether to retry.
    pub async fn plan(&self, query: &str) -> Result<RawPlan, PlannerError> {
        let messages = self.build_prompt(query);
        let text = collect_text(self.endpoint.as_ref(), messages).await?;
        parse_plan(&text)
    }
}

async fn collect_text(endpoint: &dyn ModelEndpoint, messages: Vec<ChatMessage>) -> Result<String, PlannerError> {
    let (tx, mut rx) = mpsc::channel(32);
    endpoint
        .chat_stream(messages, None, tx)
        .await
        .map_err(|e| PlannerError::InvalidJson(e.to_string()))?;

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

fn parse_plan(text: &str) -> Result<RawPlan, PlannerError> {
    let start = text.find('{').ok_or_else(|| PlannerError::InvalidJson("no JSON object in planner response".to_string()))?;
    let end = text.rfind('}').ok_or_else(|| PlannerError::InvalidJson("no JSON object in planner response".to_string()))?;
    if end < start {
        return Err(PlannerError::InvalidJson("malformed JSON object in planner response".to_string()));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| PlannerError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

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

    #[test]
    fn selects_top_k_examples_by_keyword_overlap() {
        let examples = vec![
            FewShotExample { query: "summarize the readme file".to_string(), plan_json: "A".to_string() },
            FewShotExample { query: "run the test suite in python".to_string(), plan_json: "B".to_string() },
            FewShotExample { query: "write a batch script".to_string(), plan_json: "C".to_string() },
        ];
        let planner = Planner::new(Arc::new(FixedEndpoint("{}")), examples, 2);
        let selected = planner.select_examples("please summarize the readme for me");
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].plan_json, "A");
    }

    #[tokio::test]
    async fn parses_a_strict_plan_response() {
        let body = r#"{"tasks":[{"id":"task_1","description":"read the file","agent_type":"READER","dependencies":[]}]}"#;
        let planner = Planner::new(Arc::new(FixedEndpoint(body)), vec![], DEFAULT_TOP_K);
        let plan = planner.plan("read the file").await.unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].agent_type, "READER");
    }

    #[tokio::test]
    async fn tolerates_prose_wrapped_json() {
        let body = "Sure, here is the plan:\n{\"tasks\":[{\"id\":\"task_1\",\"description\":\"x\",\"agent_type\":\"READER\",\"dependencies\":[]}]}\nLet me know if that works.";
        let planner = Planner::new(Arc::new(FixedEndpoint(body)), vec![], DEFAULT_TOP_K);
        let plan = planner.plan("x").await.unwrap();
        assert_eq!(plan.tasks.len(), 1);
    }

    #[tokio::test]
    async fn non_json_response_is_a_planner_error() {
        let planner = Planner::new(Arc::new(FixedEndpoint("no json here")), vec![], DEFAULT_TOP_K);
        let err = planner.plan("x").await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidJson(_)));
    }
}
