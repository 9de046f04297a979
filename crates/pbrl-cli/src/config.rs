//! Layered CLI configuration
//!
//! Sources, later ones winning: built-in presets, `pbrl.toml`, then
//! `PBRL_`-prefixed environment variables with `__` between sections
//! (e.g. `PBRL_TAXI__HYPERPARAMETERS__LEARNING_RATE=0.2`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use pbrl_rl::{AgentConfig, JudgeConfig};

pub const CONFIG_FILE: &str = "pbrl.toml";
pub const CONFIG_ENV: &str = "PBRL_CONFIG";

/// Which task a command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Discrete states, six actions
    Taxi,
    /// Continuous position/velocity, three actions
    MountainCar,
}

/// Settings only the discrete task needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscreteTaskConfig {
    pub n_states: usize,
}

impl Default for DiscreteTaskConfig {
    fn default() -> Self {
        Self { n_states: 500 }
    }
}

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbrlConfig {
    pub taxi: AgentConfig,
    pub mountain_car: AgentConfig,
    pub discrete: DiscreteTaskConfig,
    pub judge: JudgeConfig,
}

impl Default for PbrlConfig {
    fn default() -> Self {
        Self {
            taxi: AgentConfig::taxi(),
            mountain_car: AgentConfig::mountain_car(),
            discrete: DiscreteTaskConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

impl PbrlConfig {
    /// Load from the discovered config file and the process environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };
        Self::load_from(path.as_deref(), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("PBRL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let defaults = Config::try_from(&PbrlConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default().add_source(defaults);

        if let Some(path) = path {
            tracing::debug!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        } else {
            tracing::debug!("No config file found, using defaults");
        }

        let config = builder
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.check()?;
        Ok(config)
    }

    /// Check in order: `PBRL_CONFIG`, `./pbrl.toml`, `<config dir>/pbrl/pbrl.toml`
    pub fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("pbrl").join(CONFIG_FILE))
            .filter(|p| p.exists())
    }

    pub fn check(&self) -> Result<()> {
        self.taxi.check().context("invalid [taxi] section")?;
        self.mountain_car
            .check()
            .context("invalid [mountain_car] section")?;
        if self.discrete.n_states == 0 {
            anyhow::bail!("discrete.n_states must be at least 1");
        }
        Ok(())
    }

    pub fn agent(&self, task: TaskKind) -> &AgentConfig {
        match task {
            TaskKind::Taxi => &self.taxi,
            TaskKind::MountainCar => &self.mountain_car,
        }
    }
}
