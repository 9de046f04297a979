//! Recorded rollouts
//!
//! A [`Trajectory`] is built once from its steps and never mutated afterwards.
//! Its aggregates (`total_reward`, `episode_length`) are derived from the
//! steps at construction, and a persisted trajectory whose stored aggregates
//! disagree with its steps is rejected on load.

use serde::{Deserialize, Serialize};

use crate::error::PbrlError;
use crate::types::{ActionId, Reward, StateId, TrajectoryId};

/// Relative tolerance used when checking persisted aggregates.
const AGGREGATE_TOLERANCE: f64 = 1e-9;

/// One transition of a recorded rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// Discrete state id (a placeholder for continuous tasks)
    pub state: StateId,
    pub action: ActionId,
    pub reward: Reward,
    /// Discrete next-state id (a placeholder for continuous tasks)
    pub next_state: StateId,
    pub done: bool,
    /// Ordinal position within the trajectory
    pub step_number: usize,

    /// Raw observation for continuous tasks; discretized at credit-assignment time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_state: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_next_state: Option<Vec<f64>>,
}

impl TrajectoryStep {
    /// Step of a discrete-state task
    pub fn discrete(
        state: StateId,
        action: ActionId,
        reward: Reward,
        next_state: StateId,
        done: bool,
        step_number: usize,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            step_number,
            continuous_state: None,
            continuous_next_state: None,
        }
    }

    /// Step of a continuous-state task. Discrete ids are left at 0 until
    /// [`TrajectoryStep::with_state_ids`] is used.
    pub fn continuous(
        state: Vec<f64>,
        action: ActionId,
        reward: Reward,
        next_state: Vec<f64>,
        done: bool,
        step_number: usize,
    ) -> Self {
        Self {
            state: 0,
            action,
            reward,
            next_state: 0,
            done,
            step_number,
            continuous_state: Some(state),
            continuous_next_state: Some(next_state),
        }
    }

    pub fn with_state_ids(mut self, state: StateId, next_state: StateId) -> Self {
        self.state = state;
        self.next_state = next_state;
        self
    }

    /// Whether both raw observations are carried
    pub fn is_continuous(&self) -> bool {
        self.continuous_state.is_some() && self.continuous_next_state.is_some()
    }
}

/// Serialized form of a trajectory, aggregates included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub episode_id: TrajectoryId,
    pub steps: Vec<TrajectoryStep>,
    pub total_reward: Reward,
    pub episode_length: usize,
}

/// An ordered, immutable sequence of steps with derived aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryRecord", into = "TrajectoryRecord")]
pub struct Trajectory {
    episode_id: TrajectoryId,
    steps: Vec<TrajectoryStep>,
    total_reward: Reward,
    episode_length: usize,
}

impl Trajectory {
    /// Build a trajectory, deriving its aggregates from the steps
    pub fn new(episode_id: TrajectoryId, steps: Vec<TrajectoryStep>) -> Self {
        let total_reward = steps.iter().map(|s| s.reward).sum();
        let episode_length = steps.len();
        Self {
            episode_id,
            steps,
            total_reward,
            episode_length,
        }
    }

    pub fn empty(episode_id: TrajectoryId) -> Self {
        Self::new(episode_id, Vec::new())
    }

    pub fn episode_id(&self) -> TrajectoryId {
        self.episode_id
    }

    pub fn steps(&self) -> &[TrajectoryStep] {
        &self.steps
    }

    /// Sum of step rewards
    pub fn total_reward(&self) -> Reward {
        self.total_reward
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.episode_length
    }

    pub fn is_empty(&self) -> bool {
        self.episode_length == 0
    }

    /// Reward per step; zero for an empty trajectory
    pub fn efficiency(&self) -> f64 {
        if self.episode_length == 0 {
            0.0
        } else {
            self.total_reward / self.episode_length as f64
        }
    }

    /// Largest value reached along observation dimension `dim`, looking at the
    /// initial observation and every next observation. `None` for discrete
    /// trajectories or when the dimension is absent.
    pub fn max_observation(&self, dim: usize) -> Option<f64> {
        let first = self
            .steps
            .first()
            .and_then(|s| s.continuous_state.as_ref())
            .and_then(|obs| obs.get(dim).copied());

        self.steps
            .iter()
            .filter_map(|s| s.continuous_next_state.as_ref())
            .filter_map(|obs| obs.get(dim).copied())
            .chain(first)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    /// Whether observation dimension `dim` ever reached `threshold`
    pub fn reached(&self, dim: usize, threshold: f64) -> bool {
        self.max_observation(dim).is_some_and(|m| m >= threshold)
    }
}

impl TryFrom<TrajectoryRecord> for Trajectory {
    type Error = PbrlError;

    fn try_from(record: TrajectoryRecord) -> Result<Self, Self::Error> {
        let trajectory = Trajectory::new(record.episode_id, record.steps);

        if record.episode_length != trajectory.episode_length {
            return Err(PbrlError::DataIntegrity(format!(
                "trajectory {}: stored length {} but {} steps",
                record.episode_id, record.episode_length, trajectory.episode_length
            )));
        }

        let scale = trajectory.total_reward.abs().max(1.0);
        if (record.total_reward - trajectory.total_reward).abs() > AGGREGATE_TOLERANCE * scale {
            return Err(PbrlError::DataIntegrity(format!(
                "trajectory {}: stored total reward {} but steps sum to {}",
                record.episode_id, record.total_reward, trajectory.total_reward
            )));
        }

        Ok(trajectory)
    }
}

impl From<Trajectory> for TrajectoryRecord {
    fn from(trajectory: Trajectory) -> Self {
        Self {
            episode_id: trajectory.episode_id,
            steps: trajectory.steps,
            total_reward: trajectory.total_reward,
            episode_length: trajectory.episode_length,
        }
    }
}
