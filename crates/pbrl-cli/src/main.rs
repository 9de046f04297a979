//! PBRL CLI - Command line interface for the PBRL learning engine
//!
//! Seeds value tables from preference files, auto-labels trajectory pairs
//! and inspects persisted tables. Rollout collection happens elsewhere; this
//! tool works on the files it produces.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unused_async)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{config as config_cmd, inspect, judge, seed};

#[derive(Parser)]
#[command(name = "pbrl")]
#[command(author, version, about = "PBRL - preference-based tabular reinforcement learning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pbrl.toml or the user config dir)
    #[arg(short, long, global = true, env = "PBRL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a preference file to a new or existing value table
    Seed(seed::SeedArgs),

    /// Auto-label contrastive trajectory pairs
    Judge(judge::JudgeArgs),

    /// Inspect grids, states and snapshots
    #[command(subcommand)]
    Inspect(inspect::InspectCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pbrl={log_level},pbrl_rl={log_level}").into());

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Seed(args) => seed::run(args, config_path).await,
        Commands::Judge(args) => judge::run(args, config_path).await,
        Commands::Inspect(cmd) => inspect::run(cmd, config_path).await,
        Commands::Config(cmd) => config_cmd::run(cmd, config_path).await,
    }
}
