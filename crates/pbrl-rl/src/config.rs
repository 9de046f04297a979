//! Agent configuration: hyperparameters, preference weighting, training loop
//! bounds and discretization layout.
//!
//! Every section deserializes with `#[serde(default)]` so a partial config
//! file only overrides what it names. [`AgentConfig::check`] turns any
//! invalid value into a [`PbrlError::Config`].

use serde::{Deserialize, Serialize};
use validator::Validate;

use pbrl_core::{PbrlError, PreferenceRecord, Result, Trajectory};

/// Learning rate, discount factor and epsilon schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HyperParameters {
    /// Step size (alpha)
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub learning_rate: f64,

    /// Discount factor (gamma)
    #[validate(range(min = 0.0, max = 1.0))]
    pub discount_factor: f64,

    /// Initial exploration rate
    #[validate(range(min = 0.0, max = 1.0))]
    pub epsilon: f64,

    /// Multiplier applied once per completed episode
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub epsilon_decay: f64,

    /// Exploration floor
    #[validate(range(min = 0.0, max = 1.0))]
    pub epsilon_min: f64,
}

impl HyperParameters {
    /// Defaults used for the discrete (grid taxi) task
    pub fn taxi() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
        }
    }

    /// Defaults used for the continuous (mountain car) task
    pub fn mountain_car() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.99,
            epsilon: 1.0,
            epsilon_decay: 0.999,
            epsilon_min: 0.01,
        }
    }

    pub fn check(&self) -> Result<()> {
        let values = [
            self.learning_rate,
            self.discount_factor,
            self.epsilon,
            self.epsilon_decay,
            self.epsilon_min,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PbrlError::Config(
                "hyperparameters must be finite numbers".to_string(),
            ));
        }

        self.validate()
            .map_err(|e| PbrlError::Config(format!("invalid hyperparameters: {e}")))?;

        // A floor above the starting value would make epsilon jump upwards
        if self.epsilon_min > self.epsilon {
            return Err(PbrlError::Config(format!(
                "epsilon_min ({}) exceeds initial epsilon ({})",
                self.epsilon_min, self.epsilon
            )));
        }

        Ok(())
    }
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self::taxi()
    }
}

/// How the strength of a judgment is derived when applying a preference file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StrengthPolicy {
    /// Same strength for every record
    Fixed { strength: f64 },

    /// `base + min(|Δreward| / reward_divisor, reward_cap)
    ///   + min(|Δefficiency|, efficiency_cap)`
    Adaptive {
        base: f64,
        reward_divisor: f64,
        reward_cap: f64,
        #[serde(default)]
        efficiency_cap: Option<f64>,
    },
}

impl StrengthPolicy {
    /// Constants observed for the discrete task
    pub fn discrete_task() -> Self {
        StrengthPolicy::Adaptive {
            base: 1.0,
            reward_divisor: 10.0,
            reward_cap: 1.0,
            efficiency_cap: Some(0.5),
        }
    }

    /// Constants observed for the continuous task
    pub fn continuous_task() -> Self {
        StrengthPolicy::Adaptive {
            base: 1.0,
            reward_divisor: 50.0,
            reward_cap: 1.0,
            efficiency_cap: None,
        }
    }

    /// Strength for a judged pair. Efficiency is read from the record's
    /// descriptive scalars, reward from the trajectories themselves.
    pub fn strength(
        &self,
        preferred: &Trajectory,
        less_preferred: &Trajectory,
        record: &PreferenceRecord,
    ) -> f64 {
        match *self {
            StrengthPolicy::Fixed { strength } => strength,
            StrengthPolicy::Adaptive {
                base,
                reward_divisor,
                reward_cap,
                efficiency_cap,
            } => {
                let reward_diff = (preferred.total_reward() - less_preferred.total_reward()).abs();
                let mut strength = base + (reward_diff / reward_divisor).min(reward_cap);
                if let Some(cap) = efficiency_cap {
                    strength += record.efficiency_gap().min(cap);
                }
                strength
            }
        }
    }

    pub fn check(&self) -> Result<()> {
        match *self {
            StrengthPolicy::Fixed { strength } => {
                if !(strength.is_finite() && strength > 0.0) {
                    return Err(PbrlError::Config(format!(
                        "fixed preference strength must be positive, got {strength}"
                    )));
                }
            }
            StrengthPolicy::Adaptive {
                base,
                reward_divisor,
                reward_cap,
                efficiency_cap,
            } => {
                if !(base.is_finite() && base > 0.0) {
                    return Err(PbrlError::Config(format!(
                        "adaptive strength base must be positive, got {base}"
                    )));
                }
                if !(reward_divisor.is_finite() && reward_divisor > 0.0) {
                    return Err(PbrlError::Config(format!(
                        "reward_divisor must be positive, got {reward_divisor}"
                    )));
                }
                let caps = [Some(reward_cap), efficiency_cap];
                if caps.iter().flatten().any(|c| !(c.is_finite() && *c >= 0.0)) {
                    return Err(PbrlError::Config(
                        "strength caps must be non-negative".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for StrengthPolicy {
    fn default() -> Self {
        Self::discrete_task()
    }
}

/// Preference credit assignment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PreferenceConfig {
    /// Scales judgment strength into a reward bonus
    #[validate(range(exclusive_min = 0.0))]
    pub preference_weight: f64,

    pub strength: StrengthPolicy,
}

impl PreferenceConfig {
    pub fn check(&self) -> Result<()> {
        if !self.preference_weight.is_finite() {
            return Err(PbrlError::Config("preference_weight must be finite".to_string()));
        }
        self.validate()
            .map_err(|e| PbrlError::Config(format!("invalid preference config: {e}")))?;
        self.strength.check()
    }
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            preference_weight: 0.5,
            strength: StrengthPolicy::default(),
        }
    }
}

/// Rollout training loop bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    /// Episode count for a configured training run
    pub episodes: usize,

    /// Step bound per episode
    #[validate(range(min = 1))]
    pub max_steps: usize,

    /// Progress is logged every `log_interval` episodes; 0 disables it
    pub log_interval: usize,

    /// Window for the moving average reported in progress logs
    #[validate(range(min = 1))]
    pub average_window: usize,

    /// Seed for exploration; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 5000,
            max_steps: 200,
            log_interval: 1000,
            average_window: 100,
            seed: None,
        }
    }
}

/// Rounds of train, collect, judge and apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FeedbackConfig {
    #[validate(range(min = 1))]
    pub rounds: usize,

    /// Rollout episodes before each judging step
    pub episodes_per_round: usize,

    /// Trajectories collected for comparison after each training block
    #[validate(range(min = 2))]
    pub trajectories_per_round: usize,

    /// Upper bound on judged pairs per round
    #[validate(range(min = 1))]
    pub max_pairs: usize,

    /// Strength applied to every non-tie judgment
    #[validate(range(exclusive_min = 0.0))]
    pub strength: f64,

    /// Collect with the epsilon-greedy rule instead of pure greedy
    pub explore: bool,
}

impl FeedbackConfig {
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| PbrlError::Config(format!("invalid feedback config: {e}")))?;
        if !self.strength.is_finite() {
            return Err(PbrlError::Config("feedback strength must be finite".to_string()));
        }
        Ok(())
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            episodes_per_round: 1000,
            trajectories_per_round: 5,
            max_pairs: 2,
            strength: 1.0,
            explore: false,
        }
    }
}

/// One axis of a discretization grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    pub name: String,
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl DimensionConfig {
    pub fn new(name: impl Into<String>, bins: usize, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            bins,
            min,
            max,
        }
    }
}

/// Grid layout for continuous observations, first dimension most significant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    pub dimensions: Vec<DimensionConfig>,
}

impl DiscretizationConfig {
    /// Position in [-1.2, 0.6], velocity in [-0.07, 0.07]
    pub fn mountain_car(position_bins: usize, velocity_bins: usize) -> Self {
        Self {
            dimensions: vec![
                DimensionConfig::new("position", position_bins, -1.2, 0.6),
                DimensionConfig::new("velocity", velocity_bins, -0.07, 0.07),
            ],
        }
    }

    pub fn bin_counts(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.bins).collect()
    }
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self::mountain_car(20, 20)
    }
}

/// Everything needed to construct a training engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub n_actions: usize,
    pub hyperparameters: HyperParameters,
    pub preference: PreferenceConfig,
    pub training: TrainingConfig,
    /// Present for continuous-state tasks
    pub discretization: Option<DiscretizationConfig>,
}

impl AgentConfig {
    /// Six-action discrete task
    pub fn taxi() -> Self {
        Self {
            n_actions: 6,
            hyperparameters: HyperParameters::taxi(),
            preference: PreferenceConfig::default(),
            training: TrainingConfig {
                episodes: 10_000,
                ..TrainingConfig::default()
            },
            discretization: None,
        }
    }

    /// Three-action continuous task over a 20×20 grid
    pub fn mountain_car() -> Self {
        Self {
            n_actions: 3,
            hyperparameters: HyperParameters::mountain_car(),
            preference: PreferenceConfig {
                preference_weight: 0.5,
                strength: StrengthPolicy::continuous_task(),
            },
            training: TrainingConfig {
                log_interval: 500,
                ..TrainingConfig::default()
            },
            discretization: Some(DiscretizationConfig::default()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.training.seed = Some(seed);
        self
    }

    pub fn check(&self) -> Result<()> {
        if self.n_actions == 0 {
            return Err(PbrlError::Config("n_actions must be at least 1".to_string()));
        }
        self.hyperparameters.check()?;
        self.preference.check()?;
        self.training
            .validate()
            .map_err(|e| PbrlError::Config(format!("invalid training config: {e}")))?;
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::taxi()
    }
}
