//! Aggregator (§4.10): a terminal role invoked once per plan. Takes the
//! ordered `(description, status, result)` triples for every task and
//! produces the final user-visible answer. No tool calls — unlike the
//! other roles, its model response is taken as the answer verbatim.
//!
//! Adapted from the `ResultSynthesizer` (`services/
//! result_synthesizer.rs`): same "feed every subtask's outcome to one model
//! call and synthesize the user-facing answer" shape, generalized from a
//! fixed worker/reviewer pair to an arbitrary per-task status list
//! and narrowed to drop the inline citation renumbering, which this
//! engine has no use for.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::error::ExecutorError;
use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::ports::{ChatMessage, ModelEndpoint, StreamDelta};

const SYSTEM_PROMPT: &str = "You are synthesizing the final answer to a user's request from the \
outputs of several sub-tasks that were run to satisfy it. Quote or summarize relevant task \
outputs. If any task failed or was skipped, disclose that honestly rather than fabricating a \
result for it. Do not invent information beyond what the task outputs and the original request \
provide. You may include a fenced ```artifact:<kind>``` block if a structured artifact would help \
the user, but it is optional.";

fn render_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Skipped => "skipped (a dependency failed)",
        TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Running => "did not finish",
    }
}

fn render_tasks(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&format!(
            "- [{}] {}: {}\n",
            render_status(task.status),
            task.description,
            task.result.as_deref().unwrap_or("(no result)"),
        ));
    }
    out
}

pub struct Aggregator {
    endpoint: Arc<dyn ModelEndpoint>,
}

impl Aggregator {
    pub fn new(endpoint: Arc<dyn ModelEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Synthesize the final answer for `query` from the plan's completed
    /// (and failed/skipped) tasks.
    pub async fn aggregate(&self, query: &str, tasks: &[Task]) -> Result<String, ExecutorError> {
        let messages = vec![
            ChatMessage { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
            ChatMessage {
                role: "user".to_string(),
                content: format!("Original request: {query}\n\nTask outcomes:\n{}", render_tasks(tasks)),
            },
        ];

        let (tx, mut rx) = mpsc::channel(32);
        self.endpoint
            .chat_stream(messages, None, tx)
            .await
            .map_err(|e| ExecutorError::FallbackExhausted(e.to_string()))?;

        let mut text = String::new();
        while let Some(delta) = rx.recv().await {
            match delta {
                StreamDelta::Text(chunk) => text.push_str(&chunk),
                StreamDelta::ToolCallHint { .. } => {}
                StreamDelta::Done => break,
            }
        }

        if text.trim().is_empty() {
            return Err(ExecutorError::Exhaustion);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
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

    fn completed(id: &str, result: &str) -> Task {
        let mut t = Task::new(id, format!("do {id}"), "READER", vec![]);
        t.complete(result.to_string(), Utc::now());
        t
    }

    fn failed(id: &str) -> Task {
        let mut t = Task::new(id, format!("do {id}"), "READER", vec![]);
        t.fail(Utc::now());
        t
    }

    #[tokio::test]
    async fn synthesizes_the_final_answer_from_task_outcomes() {
        let aggregator = Aggregator::new(Arc::new(FixedEndpoint("Here is your summary.")));
        let tasks = vec![completed("t1", "contents of a.txt")];
        let answer = aggregator.aggregate("summarize a.txt", &tasks).await.unwrap();
        assert_eq!(answer, "Here is your summary.");
    }

    #[tokio::test]
    async fn empty_response_is_an_exhaustion_error() {
        let aggregator = Aggregator::new(Arc::new(FixedEndpoint("")));
        let tasks = vec![failed("t1")];
        let err = aggregator.aggregate("do something", &tasks).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Exhaustion));
    }

    #[test]
    fn renders_skipped_and_failed_statuses_distinctly() {
        let mut skipped = Task::new("t2", "do t2", "READER", vec!["t1".to_string()]);
        skipped.skip(Utc::now());
        let rendered = render_tasks(&[failed("t1"), skipped]);
        assert!(rendered.contains("[failed]"));
        assert!(rendered.contains("[skipped (a dependency failed)]"));
    }
}
