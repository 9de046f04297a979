//! Common types used throughout PBRL

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a discrete state in the value table
pub type StateId = usize;

/// Index of a discrete action in the value table
pub type ActionId = usize;

/// Scalar reward from the environment
pub type Reward = f64;

/// Identifier of a recorded trajectory (episode)
pub type TrajectoryId = u64;

/// Training run identifier, stamped on snapshots and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_run_id_serialization() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(json.trim_matches('"'), id.to_string());
    }
}
