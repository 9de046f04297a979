//! Environment contract consumed by the training engine

use pbrl_core::{ActionId, Result, Reward};

/// Result of one environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome<O> {
    pub observation: O,
    pub reward: Reward,
    /// Episode ended inside the task (goal, failure)
    pub terminated: bool,
    /// Episode cut short from outside (time limit)
    pub truncated: bool,
}

impl<O> StepOutcome<O> {
    pub fn new(observation: O, reward: Reward, terminated: bool, truncated: bool) -> Self {
        Self {
            observation,
            reward,
            terminated,
            truncated,
        }
    }

    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A simulated task with `reset`/`step` semantics.
///
/// Errors returned from either method are treated as fatal by the engine:
/// the current phase aborts and the value table keeps every update applied
/// before the failure. Implementations should report them with
/// [`PbrlError::Environment`](pbrl_core::PbrlError::Environment).
pub trait Environment {
    type Observation: Clone;

    fn n_actions(&self) -> usize;

    fn reset(&mut self) -> Result<Self::Observation>;

    fn step(&mut self, action: ActionId) -> Result<StepOutcome<Self::Observation>>;

    /// Whether an observation counts as reaching the goal, for success rates
    fn is_success(&self, _observation: &Self::Observation) -> bool {
        false
    }
}
