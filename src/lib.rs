//! Delegation engine: decomposes a user query into a DAG of tasks, routes
//! each to the best-fit model in a configured pool, executes them wave by
//! wave with tool access and quality validation, and synthesizes a final
//! answer.
//!
//! Layout follows a hexagonal/ports-and-adapters split: `domain` holds
//! models, the error taxonomy, and the ports (traits) the rest of the crate
//! programs against; `services` holds the engine's own logic (planner,
//! scheduler, executor, router, ...); `infrastructure` holds concrete
//! adapters (config loading, logging, LLM/MCP clients); `cli` is the thin
//! front door described in the configuration and logging notes below.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
