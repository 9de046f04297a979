//! Configuration management commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{PbrlConfig, CONFIG_FILE};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print which configuration file would be used
    Path,
    /// Initialize configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(cmd: ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config_path).await,
        ConfigCommands::Path => path(config_path).await,
        ConfigCommands::Init { force } => init(force).await,
    }
}

async fn show(config_path: Option<&Path>) -> Result<()> {
    let config = PbrlConfig::load(config_path)?;
    let rendered =
        toml::to_string_pretty(&config).context("Failed to render configuration as TOML")?;

    println!("Effective Configuration");
    println!("=======================\n");
    println!("{rendered}");
    Ok(())
}

async fn path(config_path: Option<&Path>) -> Result<()> {
    let found = config_path
        .map(Path::to_path_buf)
        .or_else(PbrlConfig::find_config_file);
    match found {
        Some(path) => println!("{}", path.display()),
        None => println!("No configuration file found. Using defaults."),
    }
    Ok(())
}

async fn init(force: bool) -> Result<()> {
    if tokio::fs::try_exists(CONFIG_FILE).await.unwrap_or(false) && !force {
        println!("Configuration file already exists: {CONFIG_FILE}");
        println!("Use --force to overwrite");
        return Ok(());
    }

    let example = include_str!("../../../../pbrl.toml.example");
    tokio::fs::write(CONFIG_FILE, example)
        .await
        .with_context(|| format!("Failed to write {CONFIG_FILE}"))?;
    println!("Configuration file created: {CONFIG_FILE}");

    Ok(())
}
