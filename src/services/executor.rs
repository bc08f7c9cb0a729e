//! Task Executor (§4.9) — the per-task model/tool loop: builds the prompt,
//! iterates up to the role's `loop_limit`, parses and dispatches tool
//! calls, validates the candidate result, and falls back across models on
//! exhaustion or corruption.
//!
//! Adapted from the `execute_single_task` (`services/
//! dag_executor.rs`): same build-prompt → call-model-with-timeout →
//! retry/fallback → report-and-record shape, generalized from a fixed
//! retry count against one `Substrate` to a per-role `loop_limit`
//! inner loop plus a router-selected outer fallback chain.
//!
//! Calls to the escalation endpoint are throttled through a `governor`
//! direct rate limiter built from the configured escalation rate, shared
//! across every task that escalates.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{mpsc, Mutex};

use crate::domain::error::ExecutorError;
use crate::domain::models::agent_definition::AgentDefinition;
use crate::domain::models::model_pool::RoleRequirements;
use crate::domain::models::task::{AttemptOutcome, Task, TaskAttempt};
use crate::domain::models::tool_call::ToolCall;
use crate::domain::ports::{ChatMessage, ModelEndpoint, StreamDelta, TaskRunner};
use crate::services::builtin_tools::registry::ToolRegistry;
use crate::services::dispatch::{ToolDispatcher, ERROR_SENTINEL};
use crate::services::model_router::{ModelRouter, RouteOutcome};
use crate::services::tool_parser;
use crate::services::validator::{ValidationOutcome, Validator};

/// Cap on a task's final textual answer (§4.9 step 3).
const RESULT_TRUNCATE_BYTES: usize = 32_000;
/// Cap on a single tool result folded back into the conversation.
const TOOL_RESULT_TRUNCATE_BYTES: usize = 16_000;
/// Default per-task deadline covering the whole retry chain (§4.9).
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Throttles calls to the escalation endpoint to `EscalationConfig.rate_limit`
/// requests per second, shared across every task that escalates.
type EscalationLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn build_escalation_limiter(requests_per_second: f64) -> EscalationLimiter {
    let period = Duration::from_secs_f64((1.0 / requests_per_second.max(0.001)).max(0.001));
    let quota = Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()));
    RateLimiter::direct(quota)
}

fn truncate_with_marker(mut s: String, cap: usize) -> String {
    if s.len() <= cap {
        return s;
    }
    let mut cut = cap;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let total = s.len();
    s.truncate(cut);
    s.push_str(&format!("\n(truncated, total {total} bytes)"));
    s
}

/// First non-whitespace character is beyond ASCII and most of the next few
/// characters are too (§4.9 step 2c "corrupted output").
fn looks_corrupted(text: &str) -> bool {
    let mut chars = text.chars().skip_while(|c| c.is_whitespace());
    let Some(first) = chars.next() else { return false };
    if (first as u32) <= 127 {
        return false;
    }
    let sample: Vec<char> = chars.take(7).collect();
    if sample.is_empty() {
        return true;
    }
    let non_ascii = sample.iter().filter(|c| **c as u32 > 127).count();
    non_ascii * 2 >= sample.len()
}

async fn collect_response(endpoint: &dyn ModelEndpoint, messages: Vec<ChatMessage>) -> Result<String, ExecutorError> {
    let (tx, mut rx) = mpsc::channel(32);
    endpoint
        .chat_stream(messages, None, tx)
        .await
        .map_err(|e| ExecutorError::FallbackExhausted(e.to_string()))?;

    let mut text = String::new();
    while let Some(delta) = rx.recv().await {
        match delta {
            StreamDelta::Text(chunk) => text.push_str(&chunk),
            StreamDelta::ToolCallHint { name, arguments } => {
                text.push_str(&serde_json::json!({ "name": name, "arguments": arguments }).to_string());
            }
            StreamDelta::Done => break,
        }
    }
    Ok(text)
}

/// Whether `role` may invoke `call` (§4.9 step 1: "role's allowed
/// categories minus forbidden set"). MCP tools (dotted names) are outside
/// the builtin category system and are permitted unless explicitly
/// forbidden by name.
fn tool_is_allowed(registry: &ToolRegistry, def: &AgentDefinition, call: &ToolCall) -> bool {
    let (server_or_builtin, tool) = call.split_name();
    if def.forbidden_tools.iter().any(|f| f == &call.name || f == tool) {
        return false;
    }
    if server_or_builtin != "builtin" {
        return true;
    }
    match registry.get(tool) {
        Some(entry) => def.allowed_tool_categories.iter().any(|c| c == entry.category.as_str()),
        None => false,
    }
}

fn make_attempt(model: &str, outcome: AttemptOutcome, error: Option<String>, started_at: chrono::DateTime<Utc>) -> TaskAttempt {
    TaskAttempt { model: model.to_string(), outcome, error, started_at, finished_at: Some(Utc::now()) }
}

pub struct Executor {
    agents: HashMap<String, AgentDefinition>,
    requirements: HashMap<String, RoleRequirements>,
    registry: Arc<ToolRegistry>,
    dispatcher: Arc<ToolDispatcher>,
    router: Arc<Mutex<ModelRouter>>,
    endpoints: HashMap<String, Arc<dyn ModelEndpoint>>,
    validator: Option<Arc<Validator>>,
    escalation: Option<(String, Arc<dyn ModelEndpoint>)>,
    escalation_limiter: Option<EscalationLimiter>,
    fallback_count: usize,
    task_timeout: Duration,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Vec<AgentDefinition>,
        requirements: HashMap<String, RoleRequirements>,
        registry: Arc<ToolRegistry>,
        dispatcher: Arc<ToolDispatcher>,
        router: Arc<Mutex<ModelRouter>>,
        endpoints: HashMap<String, Arc<dyn ModelEndpoint>>,
        validator: Option<Arc<Validator>>,
        escalation: Option<(String, Arc<dyn ModelEndpoint>)>,
        fallback_count: usize,
    ) -> Self {
        Self::with_escalation_rate_limit(agents, requirements, registry, dispatcher, router, endpoints, validator, escalation, fallback_count, 1.0)
    }

    /// Same as [`Executor::new`] but with an explicit escalation rate limit
    /// (requests per second) instead of the config default.
    #[allow(clippy::too_many_arguments)]
    pub fn with_escalation_rate_limit(
        agents: Vec<AgentDefinition>,
        requirements: HashMap<String, RoleRequirements>,
        registry: Arc<ToolRegistry>,
        dispatcher: Arc<ToolDispatcher>,
        router: Arc<Mutex<ModelRouter>>,
        endpoints: HashMap<String, Arc<dyn ModelEndpoint>>,
        validator: Option<Arc<Validator>>,
        escalation: Option<(String, Arc<dyn ModelEndpoint>)>,
        fallback_count: usize,
        escalation_rate_limit: f64,
    ) -> Self {
        let escalation_limiter = escalation.is_some().then(|| build_escalation_limiter(escalation_rate_limit));
        Self {
            agents: agents.into_iter().map(|a| (a.role.clone(), a)).collect(),
            requirements,
            registry,
            dispatcher,
            router,
            endpoints,
            validator,
            escalation,
            escalation_limiter,
            fallback_count,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    fn build_messages(&self, def: &AgentDefinition, task: &Task, dependencies: &[Task], feedback: Option<&str>) -> Vec<ChatMessage> {
        let mut user = String::new();
        for dep in dependencies {
            user.push_str(&format!(
                "### Dependency {}\n{}\nResult: {}\n\n",
                dep.id,
                dep.description,
                dep.result.as_deref().unwrap_or("(no result)")
            ));
        }
        user.push_str(&format!("Task: {}", task.description));
        if let Some(fb) = feedback {
            user.push_str(&format!("\n\nPrevious attempt was rejected because {fb}; produce a corrected result."));
        }
        vec![
            ChatMessage { role: "system".to_string(), content: def.system_prompt.clone() },
            ChatMessage { role: "user".to_string(), content: user },
        ]
    }

    /// Run the role's `loop_limit` model/tool iterations against one model
    /// (§4.9 steps 2a-2e and 3). Returns the bounded final answer on
    /// success.
    async fn attempt_with_model(&self, endpoint: &dyn ModelEndpoint, def: &AgentDefinition, mut messages: Vec<ChatMessage>) -> Result<String, ExecutorError> {
        let mut empty_count = 0u32;

        for _ in 0..def.loop_limit.max(1) {
            let raw = collect_response(endpoint, messages.clone()).await?;
            let parsed = tool_parser::parse(&raw);
            let visible = parsed.visible_text.trim();

            if visible.is_empty() && parsed.tool_calls.is_empty() {
                empty_count += 1;
                if empty_count >= 2 {
                    return Err(ExecutorError::Exhaustion);
                }
                messages.push(ChatMessage { role: "assistant".to_string(), content: raw });
                messages.push(ChatMessage { role: "user".to_string(), content: "Your previous response was empty. Please respond.".to_string() });
                continue;
            }

            if looks_corrupted(visible) {
                return Err(ExecutorError::CorruptedOutput(visible.chars().take(40).collect()));
            }

            if parsed.tool_calls.is_empty() {
                return Ok(truncate_with_marker(visible.to_string(), RESULT_TRUNCATE_BYTES));
            }

            messages.push(ChatMessage { role: "assistant".to_string(), content: raw });
            for call in &parsed.tool_calls {
                let result = if !tool_is_allowed(&self.registry, def, call) {
                    format!("{ERROR_SENTINEL} tool '{}' is not permitted for this role", call.name)
                } else {
                    match self.dispatcher.dispatch(call).await {
                        Ok(text) => text,
                        Err(e) => format!("{ERROR_SENTINEL} {e}"),
                    }
                };
                messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: truncate_with_marker(result, TOOL_RESULT_TRUNCATE_BYTES),
                });
            }
        }

        Err(ExecutorError::Exhaustion)
    }

    async fn run_inner(&self, task: &mut Task, dependencies: &[Task]) -> Result<(), ExecutorError> {
        let role = task.agent_role.clone();
        let def = self
            .agents
            .get(&role)
            .ok_or_else(|| ExecutorError::FallbackExhausted(format!("no agent definition for role '{role}'")))?
            .clone();
        let requirements = self.requirements.get(&role).cloned().unwrap_or_default();

        let selection = {
            let router = self.router.lock().await;
            router
                .select(&role, task.tier_estimate, &requirements, self.fallback_count)
                .map_err(|e| ExecutorError::FallbackExhausted(e.to_string()))?
        };

        let mut model_chain: Vec<String> = std::iter::once(selection.primary).chain(selection.fallbacks).collect();
        if let Some((escalation_model, _)) = &self.escalation {
            model_chain.push(escalation_model.clone());
        }

        let mut errors: Vec<String> = Vec::new();
        let mut feedback: Option<String> = None;

        for model_name in &model_chain {
            let endpoint = self
                .endpoints
                .get(model_name)
                .cloned()
                .or_else(|| self.escalation.as_ref().filter(|(name, _)| name == model_name).map(|(_, e)| e.clone()));
            let Some(endpoint) = endpoint else {
                errors.push(format!("no endpoint configured for '{model_name}'"));
                continue;
            };

            if let (Some((escalation_model, _)), Some(limiter)) = (&self.escalation, &self.escalation_limiter) {
                if escalation_model == model_name {
                    limiter.until_ready().await;
                }
            }

            let mut validation_attempts = 0u32;
            loop {
                let started_at = Utc::now();
                let messages = self.build_messages(&def, task, dependencies, feedback.as_deref());

                match self.attempt_with_model(endpoint.as_ref(), &def, messages).await {
                    Ok(text) => {
                        let applies = self.validator.as_ref().map(|v| v.applies_to(&role)).unwrap_or(false);
                        if !applies {
                            self.router.lock().await.record(model_name, &role, RouteOutcome::Success);
                            task.attempts.push(make_attempt(model_name, AttemptOutcome::Success, None, started_at));
                            task.complete(text, Utc::now());
                            return Ok(());
                        }

                        let validator = self.validator.as_ref().unwrap();
                        match validator.validate(&role, &task.description, &text).await {
                            Ok(ValidationOutcome::Valid) => {
                                self.router.lock().await.record(model_name, &role, RouteOutcome::Success);
                                task.attempts.push(make_attempt(model_name, AttemptOutcome::Success, None, started_at));
                                task.complete(text, Utc::now());
                                return Ok(());
                            }
                            Ok(ValidationOutcome::Invalid { feedback: fb }) => {
                                self.router.lock().await.record(model_name, &role, RouteOutcome::ValidationFail);
                                task.attempts.push(make_attempt(model_name, AttemptOutcome::ValidationFail, Some(fb.clone()), started_at));
                                validation_attempts += 1;
                                if validation_attempts <= validator.max_retries() {
                                    feedback = Some(fb);
                                    continue;
                                }
                                errors.push(format!("{model_name}: validation exhausted: {fb}"));
                                break;
                            }
                            Err(e) => {
                                self.router.lock().await.record(model_name, &role, RouteOutcome::Error);
                                task.attempts.push(make_attempt(model_name, AttemptOutcome::Error, Some(e.to_string()), started_at));
                                errors.push(format!("{model_name}: {e}"));
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let route_outcome = match e {
                            ExecutorError::Exhaustion => RouteOutcome::EmptyResponse,
                            _ => RouteOutcome::Error,
                        };
                        self.router.lock().await.record(model_name, &role, route_outcome);
                        task.attempts.push(make_attempt(model_name, AttemptOutcome::Error, Some(e.to_string()), started_at));
                        errors.push(format!("{model_name}: {e}"));
                        break;
                    }
                }
            }
            feedback = None;
        }

        Err(ExecutorError::FallbackExhausted(errors.join("; ")))
    }
}

#[async_trait]
impl TaskRunner for Executor {
    async fn run(&self, task: &mut Task, dependencies: &[Task]) -> Result<(), ExecutorError> {
        match tokio::time::timeout(self.task_timeout, self.run_inner(task, dependencies)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                task.fail(Utc::now());
                Err(e)
            }
            Err(_) => {
                task.fail(Utc::now());
                Err(ExecutorError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::BuiltinToolError;
    use crate::domain::models::model_pool::ModelPoolEntry;
    use crate::domain::models::tool_call::ByteRange;
    use crate::domain::ports::builtin_tool::BuiltinTool;
    use crate::domain::ports::McpTransport;
    use crate::services::mcp::multiplexer::{McpMultiplexer, TransportFactory};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reader_role() -> AgentDefinition {
        AgentDefinition {
            role: "READER".to_string(),
            system_prompt: "Answer using read-only tools.".to_string(),
            allowed_tool_categories: vec!["filesystem_read".to_string()],
            forbidden_tools: vec![],
            max_context_tokens: 8_000,
            loop_limit: 3,
            temperature: 0.2,
        }
    }

    fn pool_entry() -> ModelPoolEntry {
        let mut tier_scores = HashMap::new();
        tier_scores.insert(1u8, 0.9);
        tier_scores.insert(2u8, 0.9);
        tier_scores.insert(3u8, 0.9);
        ModelPoolEntry {
            url: "http://local".to_string(),
            model: "local-model".to_string(),
            max_concurrent: 1,
            tier_scores,
            critical_dimensions: HashMap::new(),
            important_dimensions: HashMap::new(),
            historical_latency_ms: 10.0,
            small_parameter: false,
        }
    }

    struct ScriptedEndpoint {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedEndpoint {
        fn new(responses: Vec<&str>) -> Self {
            Self { responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()) }
        }
    }

    #[async_trait]
    impl ModelEndpoint for ScriptedEndpoint {
        fn id(&self) -> &str {
            "scripted"
        }
        async fn chat_stream(&self, _messages: Vec<ChatMessage>, _tools_schema: Option<Value>, tx: mpsc::Sender<StreamDelta>) -> anyhow::Result<()> {
            let next = self.responses.lock().await.pop().unwrap_or_default();
            tx.send(StreamDelta::Text(next)).await.ok();
            tx.send(StreamDelta::Done).await.ok();
            Ok(())
        }
    }

    struct NullFactory;
    impl TransportFactory for NullFactory {
        fn build(&self, _config: &crate::domain::models::mcp_server::McpServerConfig) -> Box<dyn McpTransport> {
            unreachable!("no MCP servers configured in these tests")
        }
    }

    struct CountingEcho(Arc<AtomicUsize>);
    #[async_trait]
    impl BuiltinTool for CountingEcho {
        fn name(&self) -> &str {
            "list"
        }
        async fn call(&self, args: Value) -> Result<Value, BuiltinToolError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(args)
        }
    }

    fn setup(responses: Vec<&str>) -> (Executor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(crate::services::builtin_tools::registry::ToolCategory::FilesystemRead, json!({}), Arc::new(CountingEcho(calls.clone())));
        let registry = Arc::new(registry);

        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = Arc::new(ToolDispatcher::new(registry.clone(), mux, vec![], vec![]));

        let router = Arc::new(Mutex::new(ModelRouter::new(vec![("m1".to_string(), pool_entry())])));

        let mut endpoints: HashMap<String, Arc<dyn ModelEndpoint>> = HashMap::new();
        endpoints.insert("m1".to_string(), Arc::new(ScriptedEndpoint::new(responses)));

        let executor = Executor::new(vec![reader_role()], HashMap::new(), registry, dispatcher, router, endpoints, None, None, 1);
        (executor, calls)
    }

    fn task() -> Task {
        Task::new("t1", "read a file", "READER", vec![])
    }

    #[tokio::test]
    async fn text_only_response_completes_the_task() {
        let (executor, _calls) = setup(vec!["the answer is 42"]);
        let mut t = task();
        executor.run(&mut t, &[]).await.unwrap();
        assert_eq!(t.status, crate::domain::models::task::TaskStatus::Completed);
        assert_eq!(t.result.as_deref(), Some("the answer is 42"));
    }

    #[tokio::test]
    async fn tool_call_then_text_dispatches_then_completes() {
        let call = ToolCall { name: "list".to_string(), arguments: json!({"path": "."}), origin: ByteRange::new(0, 0) };
        let first = format!("{{\"name\":\"{}\",\"arguments\":{}}}", call.name, call.arguments);
        let (executor, calls) = setup(vec![&first, "done looking"]);
        let mut t = task();
        executor.run(&mut t, &[]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(t.result.as_deref(), Some("done looking"));
    }

    #[tokio::test]
    async fn two_empty_responses_exhaust_and_fail() {
        let (executor, _calls) = setup(vec!["", ""]);
        let mut t = task();
        let err = executor.run(&mut t, &[]).await.unwrap_err();
        assert!(matches!(err, ExecutorError::FallbackExhausted(_)));
        assert_eq!(t.status, crate::domain::models::task::TaskStatus::Failed);
    }

    #[tokio::test]
    async fn forbidden_category_tool_call_is_rejected_in_band() {
        let call = ToolCall { name: "write_file".to_string(), arguments: json!({}), origin: ByteRange::new(0, 0) };
        let first = format!("{{\"name\":\"{}\",\"arguments\":{}}}", call.name, call.arguments);
        let (executor, _calls) = setup(vec![&first, "gave up after rejection"]);
        let mut t = task();
        executor.run(&mut t, &[]).await.unwrap();
        assert_eq!(t.result.as_deref(), Some("gave up after rejection"));
    }

    #[tokio::test]
    async fn escalation_endpoint_is_used_after_pool_is_exhausted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(crate::services::builtin_tools::registry::ToolCategory::FilesystemRead, json!({}), Arc::new(CountingEcho(calls)));
        let registry = Arc::new(registry);
        let mux = Arc::new(Mutex::new(McpMultiplexer::new(vec![], Box::new(NullFactory))));
        let dispatcher = Arc::new(ToolDispatcher::new(registry.clone(), mux, vec![], vec![]));
        let router = Arc::new(Mutex::new(ModelRouter::new(vec![("m1".to_string(), pool_entry())])));

        let mut endpoints: HashMap<String, Arc<dyn ModelEndpoint>> = HashMap::new();
        endpoints.insert("m1".to_string(), Arc::new(ScriptedEndpoint::new(vec!["", ""])));
        let escalation: Arc<dyn ModelEndpoint> = Arc::new(ScriptedEndpoint::new(vec!["escalated answer"]));

        // A generous rate limit keeps the test from blocking on the limiter.
        let executor = Executor::with_escalation_rate_limit(
            vec![reader_role()],
            HashMap::new(),
            registry,
            dispatcher,
            router,
            endpoints,
            None,
            Some(("cloud-model".to_string(), escalation)),
            1,
            1_000.0,
        );
        let mut t = task();
        executor.run(&mut t, &[]).await.unwrap();
        assert_eq!(t.result.as_deref(), Some("escalated answer"));
    }

    #[tokio::test]
    async fn dependency_result_is_folded_into_the_prompt() {
        let mut dep = Task::new("t0", "list files", "READER", vec![]);
        dep.complete("a.txt, b.txt".to_string(), Utc::now());
        let (executor, _calls) = setup(vec!["used the dependency"]);
        let mut t = Task::new("t1", "summarize the files", "READER", vec!["t0".to_string()]);
        executor.run(&mut t, std::slice::from_ref(&dep)).await.unwrap();
        assert_eq!(t.result.as_deref(), Some("used the dependency"));
    }
}
