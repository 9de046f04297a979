//! Tabular value store with epsilon-greedy action selection
//!
//! The table is a dense `n_states × n_actions` array. Every write goes
//! through [`ValueStore::update_with_rate`], so rollout updates and
//! preference updates share one TD rule and differ only in step size.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use pbrl_core::{ActionId, PbrlError, Result, Reward, StateId};

use crate::config::HyperParameters;
use crate::policy::EpsilonSchedule;

/// Owned Q-table plus the hyperparameters and exploration state that drive it
#[derive(Debug, Clone)]
pub struct ValueStore {
    table: Array2<f64>,
    hyperparameters: HyperParameters,
    epsilon: EpsilonSchedule,
    rng: StdRng,
    updates: u64,
}

impl ValueStore {
    /// Zero-initialized table
    pub fn new(n_states: usize, n_actions: usize, hyperparameters: HyperParameters) -> Result<Self> {
        if n_states == 0 || n_actions == 0 {
            return Err(PbrlError::Config(format!(
                "value table needs at least one state and one action, got {n_states}x{n_actions}"
            )));
        }
        Self::from_table(Array2::zeros((n_states, n_actions)), hyperparameters)
    }

    /// Wrap an existing table, e.g. one restored from a snapshot
    pub fn from_table(table: Array2<f64>, hyperparameters: HyperParameters) -> Result<Self> {
        hyperparameters.check()?;
        if table.is_empty() {
            return Err(PbrlError::Config("value table is empty".to_string()));
        }
        Ok(Self {
            table,
            epsilon: EpsilonSchedule::from_hyperparameters(&hyperparameters),
            hyperparameters,
            rng: StdRng::from_entropy(),
            updates: 0,
        })
    }

    /// Reproducible exploration
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Resume exploration at a previously reached epsilon
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = self.epsilon.resumed_at(epsilon);
        self
    }

    pub fn n_states(&self) -> usize {
        self.table.nrows()
    }

    pub fn n_actions(&self) -> usize {
        self.table.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.table.dim()
    }

    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    pub fn into_table(self) -> Array2<f64> {
        self.table
    }

    pub fn hyperparameters(&self) -> &HyperParameters {
        &self.hyperparameters
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon.value()
    }

    pub fn epsilon_schedule(&self) -> &EpsilonSchedule {
        &self.epsilon
    }

    /// Number of TD updates applied so far
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    fn check_state(&self, state: StateId) -> Result<()> {
        if state < self.n_states() {
            Ok(())
        } else {
            Err(PbrlError::Config(format!(
                "state {state} outside [0, {})",
                self.n_states()
            )))
        }
    }

    fn check_action(&self, action: ActionId) -> Result<()> {
        if action < self.n_actions() {
            Ok(())
        } else {
            Err(PbrlError::Config(format!(
                "action {action} outside [0, {})",
                self.n_actions()
            )))
        }
    }

    /// Range check for a `(state, action, next_state)` transition
    pub fn check_transition(
        &self,
        state: StateId,
        action: ActionId,
        next_state: StateId,
    ) -> Result<()> {
        self.check_state(state)?;
        self.check_action(action)?;
        self.check_state(next_state)
    }

    /// Row of action values for a state
    pub fn q_values(&self, state: StateId) -> Result<ArrayView1<'_, f64>> {
        self.check_state(state)?;
        Ok(self.table.row(state))
    }

    pub fn value(&self, state: StateId, action: ActionId) -> Result<f64> {
        self.check_state(state)?;
        self.check_action(action)?;
        Ok(self.table[[state, action]])
    }

    pub fn set_value(&mut self, state: StateId, action: ActionId, value: f64) -> Result<()> {
        self.check_state(state)?;
        self.check_action(action)?;
        self.table[[state, action]] = value;
        Ok(())
    }

    /// Highest action value for a state
    pub fn max_value(&self, state: StateId) -> Result<f64> {
        Ok(self
            .q_values(state)?
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Action with the highest value; ties go to the lowest action index
    pub fn greedy_action(&self, state: StateId) -> Result<ActionId> {
        let row = self.q_values(state)?;
        let mut best = 0;
        for (action, &value) in row.iter().enumerate().skip(1) {
            if value > row[best] {
                best = action;
            }
        }
        Ok(best)
    }

    /// Epsilon-greedy when `training`, greedy otherwise
    pub fn select_action(&mut self, state: StateId, training: bool) -> Result<ActionId> {
        self.check_state(state)?;
        let n_actions = self.n_actions();
        if training && self.epsilon.explore(&mut self.rng) {
            Ok(self.rng.gen_range(0..n_actions))
        } else {
            self.greedy_action(state)
        }
    }

    /// TD update with the configured learning rate; returns the TD error
    pub fn update(
        &mut self,
        state: StateId,
        action: ActionId,
        reward: Reward,
        next_state: StateId,
        done: bool,
    ) -> Result<f64> {
        let alpha = self.hyperparameters.learning_rate;
        self.update_with_rate(state, action, reward, next_state, done, alpha)
    }

    /// `Q[s,a] += alpha * (target - Q[s,a])` where the target is `reward` on
    /// terminal steps and `reward + gamma * max Q[s']` otherwise.
    pub fn update_with_rate(
        &mut self,
        state: StateId,
        action: ActionId,
        reward: Reward,
        next_state: StateId,
        done: bool,
        alpha: f64,
    ) -> Result<f64> {
        self.check_transition(state, action, next_state)?;

        let target = if done {
            reward
        } else {
            reward + self.hyperparameters.discount_factor * self.max_value(next_state)?
        };

        let current = self.table[[state, action]];
        let td_error = target - current;
        self.table[[state, action]] = current + alpha * td_error;
        self.updates += 1;

        trace!(state, action, reward, target, td_error, "td update");
        Ok(td_error)
    }

    /// Advance the epsilon schedule; call once per completed episode
    pub fn decay_epsilon(&mut self) -> f64 {
        self.epsilon.decay()
    }
}
