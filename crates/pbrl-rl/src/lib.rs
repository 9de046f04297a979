//! PBRL RL - Tabular Q-learning with preference-based credit assignment
//!
//! This crate provides the learning engine: discretization of continuous
//! observations, the value table with epsilon-greedy action selection,
//! credit assignment from pairwise trajectory judgments, and the training
//! orchestrator that sequences preference seeding and rollout training.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credit;
pub mod discretizer;
pub mod engine;
pub mod env;
pub mod judge;
pub mod metrics;
pub mod persistence;
pub mod policy;
pub mod state;
pub mod value_store;

pub use config::{
    AgentConfig, DimensionConfig, DiscretizationConfig, FeedbackConfig, HyperParameters,
    PreferenceConfig, StrengthPolicy, TrainingConfig,
};
pub use credit::{PreferenceCredit, PreferenceSummary, RecordOutcome, SeedingReport};
pub use discretizer::GridDiscretizer;
pub use engine::{FeedbackRound, TrainingEngine, TrainingOutcome, TrainingPhase};
pub use env::{Environment, StepOutcome};
pub use judge::{HeuristicJudge, JudgeConfig, PreferenceJudge};
pub use metrics::{EpisodeMetrics, EvaluationStats, TrainingMetrics};
pub use persistence::ValueSnapshot;
pub use policy::EpsilonSchedule;
pub use state::{IdentityMapper, StateMapper};
pub use value_store::ValueStore;
