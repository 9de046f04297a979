//! State mapping between environment observations and value-table rows
//!
//! One TD-update primitive serves both task kinds; what differs is how an
//! observation (or a recorded step) becomes a row index:
//! - [`IdentityMapper`] for tasks whose observations already are state ids
//! - [`GridDiscretizer`] for continuous observations

use pbrl_core::{PbrlError, Result, StateId, TrajectoryStep};

use crate::config::DiscretizationConfig;
use crate::discretizer::GridDiscretizer;

/// Pluggable observation -> state id mapping
pub trait StateMapper {
    type Observation: Clone;

    /// Number of rows the value table needs
    fn n_states(&self) -> usize;

    /// Row index for a live observation
    fn state_id(&self, observation: &Self::Observation) -> Result<StateId>;

    /// Raw observation to keep on recorded steps, for tasks whose mapping
    /// is deferred to credit-assignment time
    fn raw_observation(&self, observation: &Self::Observation) -> Option<Vec<f64>>;

    /// `(state, next_state)` rows for a recorded step, or `None` when the step
    /// does not carry what this mapper needs
    fn step_states(&self, step: &TrajectoryStep) -> Result<Option<(StateId, StateId)>>;

    /// Grid layout, for snapshots
    fn discretization(&self) -> Option<DiscretizationConfig> {
        None
    }
}

/// Observations are state ids already
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMapper {
    n_states: usize,
}

impl IdentityMapper {
    pub fn new(n_states: usize) -> Result<Self> {
        if n_states == 0 {
            return Err(PbrlError::Config("n_states must be at least 1".to_string()));
        }
        Ok(Self { n_states })
    }
}

impl StateMapper for IdentityMapper {
    type Observation = StateId;

    fn n_states(&self) -> usize {
        self.n_states
    }

    fn state_id(&self, observation: &StateId) -> Result<StateId> {
        if *observation < self.n_states {
            Ok(*observation)
        } else {
            Err(PbrlError::Config(format!(
                "state {observation} outside [0, {})",
                self.n_states
            )))
        }
    }

    fn raw_observation(&self, _observation: &StateId) -> Option<Vec<f64>> {
        None
    }

    fn step_states(&self, step: &TrajectoryStep) -> Result<Option<(StateId, StateId)>> {
        Ok(Some((
            self.state_id(&step.state)?,
            self.state_id(&step.next_state)?,
        )))
    }
}

impl StateMapper for GridDiscretizer {
    type Observation = Vec<f64>;

    fn n_states(&self) -> usize {
        GridDiscretizer::n_states(self)
    }

    fn state_id(&self, observation: &Vec<f64>) -> Result<StateId> {
        self.discretize(observation)
    }

    fn raw_observation(&self, observation: &Vec<f64>) -> Option<Vec<f64>> {
        Some(observation.clone())
    }

    fn step_states(&self, step: &TrajectoryStep) -> Result<Option<(StateId, StateId)>> {
        match (&step.continuous_state, &step.continuous_next_state) {
            (Some(state), Some(next_state)) => Ok(Some((
                self.discretize(state)?,
                self.discretize(next_state)?,
            ))),
            _ => Ok(None),
        }
    }

    fn discretization(&self) -> Option<DiscretizationConfig> {
        Some(self.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mapper() {
        let mapper = IdentityMapper::new(500).unwrap();
        assert_eq!(mapper.n_states(), 500);
        assert_eq!(mapper.state_id(&42).unwrap(), 42);
        assert!(mapper.state_id(&500).is_err());
        assert!(mapper.raw_observation(&3).is_none());
        assert!(mapper.discretization().is_none());
        assert!(IdentityMapper::new(0).is_err());
    }

    #[test]
    fn test_identity_step_states() {
        let mapper = IdentityMapper::new(10).unwrap();
        let step = TrajectoryStep::discrete(3, 1, -1.0, 4, false, 0);
        assert_eq!(mapper.step_states(&step).unwrap(), Some((3, 4)));

        let bad = TrajectoryStep::discrete(3, 1, -1.0, 40, false, 0);
        assert!(mapper.step_states(&bad).is_err());
    }

    #[test]
    fn test_grid_step_states_use_raw_observations() {
        let grid = GridDiscretizer::mountain_car(20, 20).unwrap();
        let step = TrajectoryStep::continuous(vec![-0.5, 0.0], 2, -1.0, vec![0.55, 0.05], true, 0);
        let (s, n) = grid.step_states(&step).unwrap().unwrap();
        assert_eq!(s, grid.discretize(&[-0.5, 0.0]).unwrap());
        assert_eq!(n, grid.discretize(&[0.55, 0.05]).unwrap());

        // Placeholder ids alone are not enough for a continuous task
        let discrete = TrajectoryStep::discrete(5, 2, -1.0, 6, false, 0);
        assert_eq!(grid.step_states(&discrete).unwrap(), None);
    }
}
