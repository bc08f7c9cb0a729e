//! CLI front door [NEW, minimal] (§2): a small `clap`-derived surface that
//! drives one session through the full pipeline and prints the Aggregator's
//! answer. Scaffolding for exercising the library end-to-end, not a
//! supported frontend — spec.md places terminal/web/TUI frontends out of
//! scope as a product surface.

pub mod commands;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "delegate")]
#[command(about = "Delegation engine: plans, schedules, and executes a query across a model pool", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format.
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query through the full plan/schedule/execute/aggregate pipeline.
    Run {
        /// The user query to decompose and execute.
        query: String,

        /// Resume an existing session instead of starting a fresh one.
        #[arg(long)]
        session: Option<Uuid>,

        /// Domain namespace for the session's memory document.
        #[arg(long, default_value = "default")]
        domain: String,
    },

    /// Session inspection commands.
    #[command(subcommand)]
    Session(SessionCommands),

    /// Configuration inspection commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Show a session's history and domain memory snapshot.
    Show {
        /// Session id to show.
        id: Uuid,

        /// Domain namespace the session's memory lives under.
        #[arg(long, default_value = "default")]
        domain: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective, merged configuration.
    Show,
}
