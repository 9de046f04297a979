//! Preference-based credit assignment
//!
//! A pairwise judgment is spread over every step of both trajectories: the
//! preferred one receives a reward bonus, the other a penalty of half the
//! bonus magnitude. Each step's shaped reward is discounted by its position
//! (early steps keep full weight, the last ones down to 70%) and applied
//! through the regular TD rule at half the learning rate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pbrl_core::{
    ActionId, PbrlError, PreferenceRecord, Result, StateId, Trajectory, TrajectoryId,
};

use crate::config::{PreferenceConfig, StrengthPolicy};
use crate::state::StateMapper;
use crate::value_store::ValueStore;

/// Penalty magnitude relative to the bonus
pub const PENALTY_RATIO: f64 = 0.5;

/// Learning-rate multiplier for preference-driven updates
pub const PREFERENCE_RATE_SCALE: f64 = 0.5;

/// Weight lost between the first and the last step of a trajectory
pub const POSITIONAL_DECAY: f64 = 0.3;

/// `1 - (index / len) * 0.3`
pub fn positional_weight(index: usize, len: usize) -> f64 {
    if len == 0 {
        return 1.0;
    }
    1.0 - (index as f64 / len as f64) * POSITIONAL_DECAY
}

/// Reward shaping derived from one judgment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardModifiers {
    pub bonus: f64,
    pub penalty: f64,
}

impl RewardModifiers {
    pub fn new(strength: f64, preference_weight: f64) -> Self {
        Self {
            bonus: strength * preference_weight,
            penalty: -strength * preference_weight * PENALTY_RATIO,
        }
    }
}

/// Steps touched while crediting one trajectory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryCredit {
    pub updated_steps: usize,
    /// Steps the state mapper could not place (e.g. missing raw observations)
    pub skipped_steps: usize,
}

/// One applied judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub preferred_id: TrajectoryId,
    pub less_preferred_id: TrajectoryId,
    pub preferred_reward: f64,
    pub less_preferred_reward: f64,
    pub strength: f64,
    pub bonus: f64,
    pub penalty: f64,
    pub updated_steps: usize,
    pub skipped_steps: usize,
}

/// What happened to a single preference record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Applied { strength: f64 },
    Tie,
    MissingTrajectory { trajectory_ids: Vec<TrajectoryId> },
    InvalidStrength { strength: f64 },
}

/// Tally of a preference-seeding pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedingReport {
    pub total_records: usize,
    pub applied: usize,
    pub ties: usize,
    /// Records referencing a trajectory id absent from the supplied set
    pub skipped_missing: usize,
    /// Records whose derived strength was not a positive finite number
    pub skipped_invalid_strength: usize,
    pub updated_steps: usize,
    pub skipped_steps: usize,
    pub missing_ids: Vec<TrajectoryId>,
}

impl SeedingReport {
    pub fn skipped(&self) -> usize {
        self.skipped_missing + self.skipped_invalid_strength
    }

    /// Fold another pass into this one
    pub fn merge(&mut self, other: &SeedingReport) {
        self.total_records += other.total_records;
        self.applied += other.applied;
        self.ties += other.ties;
        self.skipped_missing += other.skipped_missing;
        self.skipped_invalid_strength += other.skipped_invalid_strength;
        self.updated_steps += other.updated_steps;
        self.skipped_steps += other.skipped_steps;
        for id in &other.missing_ids {
            if !self.missing_ids.contains(id) {
                self.missing_ids.push(*id);
            }
        }
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        self.total_records += 1;
        match outcome {
            RecordOutcome::Applied { .. } => self.applied += 1,
            RecordOutcome::Tie => self.ties += 1,
            RecordOutcome::MissingTrajectory { trajectory_ids } => {
                self.skipped_missing += 1;
                for id in trajectory_ids {
                    if !self.missing_ids.contains(id) {
                        self.missing_ids.push(*id);
                    }
                }
            }
            RecordOutcome::InvalidStrength { .. } => self.skipped_invalid_strength += 1,
        }
    }
}

/// Aggregate view over every applied judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSummary {
    pub total_updates: usize,
    pub avg_strength: f64,
    pub avg_bonus: f64,
    pub avg_penalty: f64,
    /// `preferred_reward - less_preferred_reward` per judgment
    pub reward_differences: Vec<f64>,
    pub preference_weight: f64,
}

/// Applies pairwise judgments to a [`ValueStore`]
#[derive(Debug, Clone)]
pub struct PreferenceCredit {
    preference_weight: f64,
    strength_policy: StrengthPolicy,
    history: Vec<PreferenceUpdate>,
}

impl PreferenceCredit {
    pub fn new(config: &PreferenceConfig) -> Result<Self> {
        config.check()?;
        Ok(Self {
            preference_weight: config.preference_weight,
            strength_policy: config.strength.clone(),
            history: Vec::new(),
        })
    }

    pub fn preference_weight(&self) -> f64 {
        self.preference_weight
    }

    pub fn strength_policy(&self) -> &StrengthPolicy {
        &self.strength_policy
    }

    pub fn modifiers(&self, strength: f64) -> RewardModifiers {
        RewardModifiers::new(strength, self.preference_weight)
    }

    /// Every judgment applied so far, in order
    pub fn history(&self) -> &[PreferenceUpdate] {
        &self.history
    }

    pub fn update_count(&self) -> usize {
        self.history.len()
    }

    /// Reinforce `preferred` and suppress `less_preferred` with an explicit strength
    pub fn apply_preference<M: StateMapper>(
        &mut self,
        store: &mut ValueStore,
        mapper: &M,
        preferred: &Trajectory,
        less_preferred: &Trajectory,
        strength: f64,
    ) -> Result<PreferenceUpdate> {
        if !(strength.is_finite() && strength > 0.0) {
            return Err(PbrlError::Numeric(format!(
                "preference strength must be positive and finite, got {strength}"
            )));
        }

        // Both trajectories are resolved in full before the first write, so a
        // bad step leaves the table untouched
        let modifiers = self.modifiers(strength);
        let up = plan_credit(store, mapper, preferred, modifiers.bonus)?;
        let down = plan_credit(store, mapper, less_preferred, modifiers.penalty)?;

        let alpha = store.hyperparameters().learning_rate * PREFERENCE_RATE_SCALE;
        for step in up.steps.iter().chain(&down.steps) {
            store.update_with_rate(
                step.state,
                step.action,
                step.reward,
                step.next_state,
                step.done,
                alpha,
            )?;
        }
        let (up, down) = (up.credit(), down.credit());

        let update = PreferenceUpdate {
            preferred_id: preferred.episode_id(),
            less_preferred_id: less_preferred.episode_id(),
            preferred_reward: preferred.total_reward(),
            less_preferred_reward: less_preferred.total_reward(),
            strength,
            bonus: modifiers.bonus,
            penalty: modifiers.penalty,
            updated_steps: up.updated_steps + down.updated_steps,
            skipped_steps: up.skipped_steps + down.skipped_steps,
        };

        debug!(
            preferred = update.preferred_id,
            less_preferred = update.less_preferred_id,
            strength,
            bonus = update.bonus,
            penalty = update.penalty,
            steps = update.updated_steps,
            "Applied preference"
        );

        self.history.push(update.clone());
        Ok(update)
    }

    /// Apply one record against an id -> trajectory index. Ties, unknown ids and
    /// unusable strengths leave the table untouched.
    pub fn apply_record<M: StateMapper>(
        &mut self,
        store: &mut ValueStore,
        mapper: &M,
        record: &PreferenceRecord,
        trajectories: &HashMap<TrajectoryId, &Trajectory>,
    ) -> Result<RecordOutcome> {
        let Some((preferred_id, less_id)) = record.ordered_ids() else {
            return Ok(RecordOutcome::Tie);
        };

        let missing: Vec<TrajectoryId> = [record.trajectory_a_id, record.trajectory_b_id]
            .into_iter()
            .filter(|id| !trajectories.contains_key(id))
            .collect();
        if !missing.is_empty() {
            warn!(
                trajectory_a = record.trajectory_a_id,
                trajectory_b = record.trajectory_b_id,
                ?missing,
                "Skipping preference record: unknown trajectory"
            );
            return Ok(RecordOutcome::MissingTrajectory {
                trajectory_ids: missing,
            });
        }
        let preferred = trajectories[&preferred_id];
        let less_preferred = trajectories[&less_id];

        let strength = self.strength_policy.strength(preferred, less_preferred, record);
        if !(strength.is_finite() && strength > 0.0) {
            warn!(
                trajectory_a = record.trajectory_a_id,
                trajectory_b = record.trajectory_b_id,
                strength,
                "Skipping preference record: unusable strength"
            );
            return Ok(RecordOutcome::InvalidStrength { strength });
        }

        self.apply_preference(store, mapper, preferred, less_preferred, strength)?;
        Ok(RecordOutcome::Applied { strength })
    }

    /// Apply every record once, in order
    pub fn seed<M: StateMapper>(
        &mut self,
        store: &mut ValueStore,
        mapper: &M,
        records: &[PreferenceRecord],
        trajectories: &[Trajectory],
    ) -> Result<SeedingReport> {
        let index = index_trajectories(trajectories);
        let mut report = SeedingReport::default();
        let steps_before = self.step_totals();

        for record in records {
            let outcome = self.apply_record(store, mapper, record, &index)?;
            report.record(&outcome);
        }

        let steps_after = self.step_totals();
        report.updated_steps = steps_after.0 - steps_before.0;
        report.skipped_steps = steps_after.1 - steps_before.1;

        if report.skipped() > 0 {
            warn!(
                skipped_missing = report.skipped_missing,
                skipped_invalid_strength = report.skipped_invalid_strength,
                "Some preference records were not applied"
            );
        }
        info!(
            applied = report.applied,
            ties = report.ties,
            total = report.total_records,
            "Preference seeding complete"
        );

        Ok(report)
    }

    fn step_totals(&self) -> (usize, usize) {
        self.history.iter().fold((0, 0), |(u, s), h| {
            (u + h.updated_steps, s + h.skipped_steps)
        })
    }

    pub fn summary(&self) -> Option<PreferenceSummary> {
        if self.history.is_empty() {
            return None;
        }
        let n = self.history.len() as f64;
        let mean = |f: fn(&PreferenceUpdate) -> f64| self.history.iter().map(f).sum::<f64>() / n;

        Some(PreferenceSummary {
            total_updates: self.history.len(),
            avg_strength: mean(|h| h.strength),
            avg_bonus: mean(|h| h.bonus),
            avg_penalty: mean(|h| h.penalty),
            reward_differences: self
                .history
                .iter()
                .map(|h| h.preferred_reward - h.less_preferred_reward)
                .collect(),
            preference_weight: self.preference_weight,
        })
    }
}

/// Id -> trajectory lookup. A repeated id keeps its last occurrence.
pub fn index_trajectories(trajectories: &[Trajectory]) -> HashMap<TrajectoryId, &Trajectory> {
    let mut index = HashMap::with_capacity(trajectories.len());
    for trajectory in trajectories {
        if index.insert(trajectory.episode_id(), trajectory).is_some() {
            warn!(
                trajectory_id = trajectory.episode_id(),
                "Duplicate trajectory id, keeping the last one"
            );
        }
    }
    index
}

/// A shaped transition ready to be applied
#[derive(Debug, Clone, Copy)]
struct PlannedStep {
    state: StateId,
    action: ActionId,
    reward: f64,
    next_state: StateId,
    done: bool,
}

#[derive(Debug, Default)]
struct CreditPlan {
    steps: Vec<PlannedStep>,
    skipped_steps: usize,
}

impl CreditPlan {
    fn credit(&self) -> TrajectoryCredit {
        TrajectoryCredit {
            updated_steps: self.steps.len(),
            skipped_steps: self.skipped_steps,
        }
    }
}

/// Map and range-check every step of one trajectory without touching the table
fn plan_credit<M: StateMapper>(
    store: &ValueStore,
    mapper: &M,
    trajectory: &Trajectory,
    modifier: f64,
) -> Result<CreditPlan> {
    let len = trajectory.len();
    let mut plan = CreditPlan::default();

    for (index, step) in trajectory.steps().iter().enumerate() {
        let Some((state, next_state)) = mapper.step_states(step)? else {
            plan.skipped_steps += 1;
            continue;
        };
        store.check_transition(state, step.action, next_state)?;

        plan.steps.push(PlannedStep {
            state,
            action: step.action,
            reward: (step.reward + modifier) * positional_weight(index, len),
            next_state,
            done: step.done,
        });
    }

    if plan.skipped_steps > 0 {
        warn!(
            trajectory_id = trajectory.episode_id(),
            skipped = plan.skipped_steps,
            "Steps without usable state information were not credited"
        );
    }

    Ok(plan)
}
