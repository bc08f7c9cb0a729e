//! Delegation engine CLI entry point.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use delegate_engine::cli::{commands, Cli, Commands, ConfigCommands, SessionCommands};
use delegate_engine::domain::ports::ModelEndpoint;
use delegate_engine::infrastructure::config::ConfigLoader;
use delegate_engine::infrastructure::llm::{CloudEndpoint, LocalEndpoint};
use delegate_engine::infrastructure::logging;
use delegate_engine::services::engine::EngineDeps;
use delegate_engine::services::session_manager::SessionManager;

fn build_endpoints(config: &delegate_engine::domain::models::config::Config) -> (HashMap<String, Arc<dyn ModelEndpoint>>, Option<(String, Arc<dyn ModelEndpoint>)>) {
    let mut endpoints: HashMap<String, Arc<dyn ModelEndpoint>> = HashMap::new();
    for entry in &config.model_pool {
        let endpoint: Arc<dyn ModelEndpoint> = Arc::new(LocalEndpoint::new(entry.model.clone(), entry.url.clone(), entry.model.clone()));
        endpoints.insert(entry.model.clone(), endpoint);
    }

    let escalation = if config.escalation.enabled {
        let provider = config.escalation.provider.clone().unwrap_or_else(|| "anthropic".to_string());
        let api_key = config
            .escalation
            .api_key_ref
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default();
        let endpoint: Arc<dyn ModelEndpoint> = Arc::new(CloudEndpoint::new(provider.clone(), "https://api.anthropic.com", provider.clone(), api_key));
        Some((provider, endpoint))
    } else {
        None
    };

    (endpoints, escalation)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    if let Commands::Config(ConfigCommands::Show) = &cli.command {
        return commands::handle_config_show(&config, cli.json);
    }

    let (endpoints, escalation) = build_endpoints(&config);
    let sessions = Arc::new(SessionManager::new(config.memory.storage_dir.clone()));

    match cli.command {
        Commands::Run { query, session, domain } => {
            let deps = EngineDeps { endpoints, escalation, ..Default::default() };
            let engine = commands::build_engine(config, sessions.clone(), deps);
            commands::handle_run(&engine, &sessions, query, session, domain, cli.json).await?;
        }
        Commands::Session(SessionCommands::Show { id, domain }) => {
            commands::handle_session_show(&sessions, id, domain, cli.json).await?;
        }
        Commands::Config(ConfigCommands::Show) => {
            unreachable!("config show handled before session manager setup");
        }
    }

    Ok(())
}
