//! Domain error types for the delegation engine.
//!
//! Each error enum covers one component from the error taxonomy; a top-level
//! `DelegationError` composes them for session-level reporting. `anyhow` is
//! reserved for the process boundary (CLI, `main`) — everything below
//! propagates typed errors with `?`.

use thiserror::Error;

/// Errors raised while extracting tool calls from a model response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolParserError {
    /// A carrier looked like a tool call but failed to parse as JSON; the
    /// parser skips it and continues rather than failing the whole response.
    #[error("malformed tool-call carrier: {0}")]
    MalformedCarrier(String),
}

/// Errors raised by the MCP client multiplexer.
#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("MCP server '{0}' is not configured")]
    UnknownServer(String),

    #[error("MCP transport error for '{server}': {detail}")]
    TransportError { server: String, detail: String },

    #[error("MCP server '{server}' returned an error for tool '{tool}': {detail}")]
    ToolServerError {
        server: String,
        tool: String,
        detail: String,
    },

    #[error("MCP call to '{server}.{tool}' timed out after {secs}s")]
    Timeout { server: String, tool: String, secs: u64 },

    #[error("transport lifetime violation: {0}")]
    TransportLifetimeViolation(String),
}

/// Errors raised by built-in tool handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuiltinToolError {
    #[error("unknown built-in tool: {0}")]
    UnknownTool(String),

    #[error("argument error for '{tool}': {detail}")]
    ArgError { tool: String, detail: String },

    #[error("ambiguous patch: search string matched {count} times in {path}, specify `occurrence`")]
    AmbiguousPatch { path: String, count: usize },

    #[error("no match: search string not found in {0}")]
    PatchNoMatch(String),

    #[error("path '{0}' escapes the workspace root")]
    PathEscapesRoot(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// A tool call that could not be dispatched at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolDispatchError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),
}

/// Errors raised mutating or loading domain memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("goal not found: {0}")]
    GoalNotFound(String),

    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("storage I/O failure: {0}")]
    StorageIo(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),
}

/// Errors raised by the model router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("no model in the pool satisfies role '{role}' at tier {tier}")]
    NoEligibleModel { role: String, tier: u8 },
}

/// Errors raised by the quality validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("validation model call failed: {0}")]
    ModelCallFailed(String),
}

/// Errors raised by the planner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("planner produced invalid JSON: {0}")]
    InvalidJson(String),
}

/// Errors raised by the plan validator / scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("plan has no tasks")]
    EmptyPlan,

    #[error("plan has {0} tasks, exceeding the maximum of 12")]
    TooManyTasks(usize),

    #[error("task '{0}' is missing a required field: {1}")]
    MissingField(String, &'static str),

    #[error("task '{0}' has unknown agent role '{1}'")]
    UnknownAgent(String, String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("plan dependency graph contains a cycle")]
    PlanCycle,
}

/// Errors raised by the per-task executor loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("model returned two consecutive empty responses")]
    Exhaustion,

    #[error("model output appears corrupted: {0}")]
    CorruptedOutput(String),

    #[error("validation failed after exhausting retries: {0}")]
    ValidationExhausted(String),

    #[error("no escalation provider is configured")]
    EscalationUnavailable,

    #[error("task exceeded its deadline")]
    Timeout,

    #[error("all fallback models exhausted: {0}")]
    FallbackExhausted(String),
}

/// Errors raised by the session manager (§2, §4.4, §5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already has a plan in flight")]
    AlreadyRunning(String),
}

/// Top-level error composing every component's taxonomy, for reporting at
/// the session boundary.
#[derive(Error, Debug, Clone)]
pub enum DelegationError {
    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error(transparent)]
    BuiltinTool(#[from] BuiltinToolError),

    #[error(transparent)]
    Dispatch(#[from] ToolDispatchError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
