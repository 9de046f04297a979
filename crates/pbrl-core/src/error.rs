//! Error types for PBRL

use thiserror::Error;

/// Main error type for PBRL
#[derive(Error, Debug)]
pub enum PbrlError {
    /// Invalid bin counts, mismatched dimensions, malformed hyperparameters,
    /// or state/action ids outside the table.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record refers to data that is not available (e.g. an unknown trajectory id).
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    /// Failure surfaced by the external environment during reset or step.
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PbrlError {
    /// Build an environment error from any displayable failure
    pub fn environment(err: impl std::fmt::Display) -> Self {
        PbrlError::Environment(err.to_string())
    }
}

/// Result type alias for PBRL operations
pub type Result<T> = std::result::Result<T, PbrlError>;
