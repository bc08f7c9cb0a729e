//! Command handlers for the CLI front door (§2 [NEW]).
//!
//! Each handler takes the parsed arguments plus the shared [`DelegationEngine`]
//! / [`SessionManager`], does the minimal amount of I/O to satisfy the
//! command, and prints either a plain-text or JSON rendering depending on
//! `--json`. Shaped after `cli/commands/*.rs` handle_* functions: thin
//! wrappers around a service call plus formatted output.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use crate::domain::models::config::Config;
use crate::services::engine::DelegationEngine;
use crate::services::session_manager::SessionManager;

pub async fn handle_run(
    engine: &DelegationEngine,
    sessions: &SessionManager,
    query: String,
    session: Option<Uuid>,
    domain: String,
    json: bool,
) -> Result<()> {
    let session_id = match session {
        Some(id) => id,
        None => sessions.create(domain, format!("session for: {query}")).await,
    };

    let answer = engine.run_query(session_id, &query).await.context("query failed")?;

    if json {
        let body = serde_json::json!({ "session_id": session_id, "answer": answer });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("session: {}", style(session_id).bold());
        println!();
        println!("{answer}");
    }
    Ok(())
}

pub async fn handle_session_show(sessions: &SessionManager, id: Uuid, domain: String, json: bool) -> Result<()> {
    if sessions.get(id).await.is_err() {
        sessions.resume(&domain, id).await.context("session not found")?;
    }
    let session = sessions.get(id).await?;
    let memory = sessions.memory(id).await?;
    let snapshot = memory.snapshot().await;

    if json {
        let body = serde_json::json!({ "session": session, "memory": snapshot });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("session {} ({})", style(session.id).bold(), session.domain);
    println!("{}", session.description);
    println!("created: {}  last active: {}", session.created_at, session.last_active_at);
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["role", "content"]);
    for turn in &session.history {
        table.add_row(vec![Cell::new(&turn.role), Cell::new(truncate(&turn.content, 100))]);
    }
    println!("{table}");

    println!();
    println!("goals: {}  progress entries: {}  version: {}", snapshot.goals.len(), snapshot.progress.len(), snapshot.version);
    Ok(())
}

pub fn handle_config_show(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("model pool:");
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["model", "url", "max_concurrent", "small_parameter"]);
    for entry in &config.model_pool {
        table.add_row(vec![
            Cell::new(&entry.model),
            Cell::new(&entry.url),
            Cell::new(entry.max_concurrent),
            Cell::new(entry.small_parameter),
        ]);
    }
    println!("{table}");

    println!();
    println!("mcp servers: {}", config.mcp_servers.len());
    println!("validation: {} max_retries={}", enabled_label(config.validation.enabled), config.validation.max_retries);
    println!(
        "escalation: {} rate_limit={}/s",
        enabled_label(config.escalation.enabled),
        config.escalation.rate_limit
    );
    println!("session timeout: {} minutes", config.session_timeout_minutes);
    println!("logging: level={} format={:?}", config.logging.level, config.logging.format);
    Ok(())
}

fn enabled_label(enabled: bool) -> console::StyledObject<&'static str> {
    if enabled {
        style("enabled").green()
    } else {
        style("disabled").dim()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

/// Resolve a `DelegationEngine` given `config` and the model endpoints
/// reachable from it. Every pool entry is wired as an OpenAI-compatible
/// [`crate::infrastructure::llm::LocalEndpoint`]; `main` constructs the
/// escalation endpoint (if configured) separately since it speaks a
/// different wire format.
pub fn build_engine(config: Config, sessions: Arc<SessionManager>, deps: crate::services::engine::EngineDeps) -> DelegationEngine {
    let workspace_root = DelegationEngine::resolve_workspace_root(&config);
    DelegationEngine::new(config, workspace_root, sessions, deps)
}
