//! PBRL Core - Data model, shared types and error taxonomy
//!
//! This crate provides the passive entities exchanged between rollout
//! collection, preference collection and the learning engine: recorded
//! trajectories and pairwise preference judgments.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod preference;
pub mod trajectory;
pub mod types;

pub use error::{PbrlError, Result};
pub use preference::{PreferenceChoice, PreferenceRecord};
pub use trajectory::{Trajectory, TrajectoryStep};
pub use types::*;
