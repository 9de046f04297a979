//! Epsilon-greedy exploration schedule

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::HyperParameters;

/// Current exploration rate with multiplicative decay towards a floor.
///
/// `epsilon` never increases and never drops below `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    value: f64,
    decay: f64,
    min: f64,
}

impl EpsilonSchedule {
    pub fn new(value: f64, decay: f64, min: f64) -> Self {
        Self {
            value: value.max(min),
            decay,
            min,
        }
    }

    pub fn from_hyperparameters(hp: &HyperParameters) -> Self {
        Self::new(hp.epsilon, hp.epsilon_decay, hp.epsilon_min)
    }

    /// Same schedule resumed at `value`
    pub fn resumed_at(self, value: f64) -> Self {
        Self::new(value, self.decay, self.min)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay
    }

    pub fn floor(&self) -> f64 {
        self.min
    }

    /// `epsilon = max(min, epsilon * decay)`; call once per completed episode
    pub fn decay(&mut self) -> f64 {
        self.value = (self.value * self.decay).max(self.min);
        self.value
    }

    /// Draw whether this decision explores
    pub fn explore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.value
    }
}
