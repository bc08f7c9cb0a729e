//! Delegation Engine: wires the planner, scheduler, executor, validator,
//! and aggregator into the end-to-end pipeline spec.md §2 describes —
//! `user query → Planner → Plan Validator → Scheduler → wave-parallel Task
//! Executors → Aggregator → user` — for one session at a time.
//!
//! Shaped after `SwarmOrchestrator` (`services/swarm_orchestrator.rs` /
//! `application/swarm_orchestrator.rs`): compose the already-built services
//! into one entry point the CLI calls, generalized from a fixed
//! worker-pool swarm loop into a per-query plan/schedule/execute/aggregate
//! pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::error::DelegationError;
use crate::domain::models::agent_definition::{builtin_roles, AgentDefinition};
use crate::domain::models::config::Config;
use crate::domain::models::mcp_server::McpServerConfig;
use crate::domain::models::model_pool::RoleRequirements;
use crate::domain::models::plan::RawPlan;
use crate::domain::ports::ModelEndpoint;
use crate::infrastructure::mcp::RealTransportFactory;
use crate::services::aggregator::Aggregator;
use crate::services::builtin_tools;
use crate::services::dispatch::ToolDispatcher;
use crate::services::executor::Executor;
use crate::services::mcp::multiplexer::McpMultiplexer;
use crate::services::model_router::ModelRouter;
use crate::services::planner::{FewShotExample, Planner};
use crate::services::scheduler::{self, Scheduler};
use crate::services::session_manager::{SessionEvent, SessionManager};
use crate::services::validator::Validator;

/// Everything the engine needs beyond `Config` itself: the model endpoints
/// to route between (keyed by the name used in `config.model_pool`) and,
/// optionally, a paid escalation endpoint (§6 "External Interfaces").
pub struct EngineDeps {
    pub endpoints: HashMap<String, Arc<dyn ModelEndpoint>>,
    pub escalation: Option<(String, Arc<dyn ModelEndpoint>)>,
    pub planner_examples: Vec<FewShotExample>,
    pub agents: Vec<AgentDefinition>,
}

impl Default for EngineDeps {
    fn default() -> Self {
        Self { endpoints: HashMap::new(), escalation: None, planner_examples: Vec::new(), agents: builtin_roles() }
    }
}

pub struct DelegationEngine {
    config: Config,
    workspace_root: PathBuf,
    sessions: Arc<SessionManager>,
    router: Arc<Mutex<ModelRouter>>,
    endpoints: HashMap<String, Arc<dyn ModelEndpoint>>,
    escalation: Option<(String, Arc<dyn ModelEndpoint>)>,
    agents: Vec<AgentDefinition>,
    planner: Arc<Planner>,
}

impl DelegationEngine {
    /// Resolve the workspace root from `config.workspace_root`, falling
    /// back to the process's current directory when unset.
    pub fn resolve_workspace_root(config: &Config) -> PathBuf {
        config.workspace_root.clone().unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn new(config: Config, workspace_root: impl Into<PathBuf>, sessions: Arc<SessionManager>, deps: EngineDeps) -> Self {
        let pool = config.model_pool.iter().map(|entry| (entry.model.clone(), entry.clone())).collect();
        let router = Arc::new(Mutex::new(ModelRouter::new(pool)));

        let planner_endpoint = config
            .agent_models
            .get("PLANNER")
            .and_then(|name| deps.endpoints.get(name))
            .or_else(|| deps.endpoints.values().next())
            .cloned()
            .expect("at least one model endpoint must be configured to run the planner");
        let planner = Arc::new(Planner::new(planner_endpoint, deps.planner_examples, crate::services::planner::DEFAULT_TOP_K));

        Self {
            config,
            workspace_root: workspace_root.into(),
            sessions,
            router,
            endpoints: deps.endpoints,
            escalation: deps.escalation,
            agents: deps.agents,
            planner,
        }
    }

    fn known_roles(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.role.clone()).collect()
    }

    fn validator(&self) -> Option<Arc<Validator>> {
        if !self.config.validation.enabled {
            return None;
        }
        let model = self.config.validation.validation_model.as_ref()?;
        let endpoint = self.endpoints.get(model)?.clone();
        Some(Arc::new(Validator::new(endpoint, self.config.validation.validate_roles.clone(), self.config.validation.max_retries)))
    }

    fn aggregator(&self) -> Aggregator {
        let endpoint = self
            .config
            .agent_models
            .get("AGGREGATOR")
            .and_then(|name| self.endpoints.get(name))
            .or_else(|| self.endpoints.values().next())
            .cloned()
            .expect("at least one model endpoint must be configured to run the aggregator");
        Aggregator::new(endpoint)
    }

    /// Run one user query through the full pipeline and return the
    /// Aggregator's final answer (§2 "Data flow").
    pub async fn run_query(&self, session_id: Uuid, query: &str) -> Result<String, DelegationError> {
        self.sessions.begin_plan(session_id).await?;
        let result = self.run_query_inner(session_id, query).await;
        self.sessions.end_plan(session_id).await?;
        result
    }

    async fn run_query_inner(&self, session_id: Uuid, query: &str) -> Result<String, DelegationError> {
        self.sessions.push_turn(session_id, "user", query).await?;

        let raw_plan: RawPlan = self.planner.plan(query).await?;
        let (mut plan, dag) = scheduler::validate_plan(&raw_plan, &self.known_roles())?;

        let memory = self.sessions.memory(session_id).await?;
        let registry = Arc::new(builtin_tools::build_registry(&self.workspace_root, memory.clone(), "executor"));

        let mcp_configs: Vec<McpServerConfig> = self.config.mcp_servers.iter().filter(|s| s.enabled).cloned().collect();
        let mcp = Arc::new(Mutex::new(McpMultiplexer::new(mcp_configs, Box::new(RealTransportFactory))));
        let dispatcher = Arc::new(ToolDispatcher::new(registry.clone(), mcp, self.config.disabled_tools.clone(), self.config.disabled_servers.clone()));

        let requirements: HashMap<String, RoleRequirements> =
            self.agents.iter().map(|a| (a.role.clone(), RoleRequirements::default())).collect();

        let executor = Executor::with_escalation_rate_limit(
            self.agents.clone(),
            requirements,
            registry,
            dispatcher,
            self.router.clone(),
            self.endpoints.clone(),
            self.validator(),
            self.escalation.clone(),
            if self.config.escalation.enabled { 2 } else { 1 },
            self.config.escalation.rate_limit,
        );

        let concurrency = self.config.model_pool.len().max(1) * 2;
        let scheduler = Scheduler::new(Arc::new(executor), concurrency);
        scheduler.run(&mut plan, &dag).await?;

        for task in &plan.tasks {
            self.sessions
                .notify_task(session_id, SessionEvent::TaskFinished { task_id: task.id.clone(), status: format!("{:?}", task.status) })
                .await;
        }

        let answer = self.aggregator().aggregate(query, &plan.tasks).await?;
        self.sessions.push_turn(session_id, "assistant", &answer).await?;
        Ok(answer)
    }
}
