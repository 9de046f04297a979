//! Heuristic preference labelling and contrastive pair selection
//!
//! Stands in for a human judge when building preference files in bulk.
//! Criteria are applied in order and the first decisive one wins:
//!
//! 1. success beats failure
//! 2. between two successes, the clearly shorter one
//! 3. between two failures, the one that climbed clearly higher (a moderate
//!    climb gap only counts when the rewards also differ)
//! 4. a large total-reward gap
//! 5. an efficiency (reward per step) gap
//!
//! Anything else is a tie.

use serde::{Deserialize, Serialize};
use tracing::debug;

use pbrl_core::{PreferenceChoice, PreferenceRecord, Trajectory};

/// Thresholds for [`HeuristicJudge`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Observation dimension tracked for progress (position for mountain car)
    pub progress_dim: usize,
    /// Progress value that counts as reaching the goal
    pub goal: f64,
    /// Length gap (steps) between two successes that decides
    pub length_margin: usize,
    pub strong_progress_gap: f64,
    pub moderate_progress_gap: f64,
    /// Reward gap backing a moderate progress gap
    pub moderate_reward_gap: f64,
    pub reward_gap: f64,
    pub efficiency_gap: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            progress_dim: 0,
            goal: 0.5,
            length_margin: 3,
            strong_progress_gap: 0.1,
            moderate_progress_gap: 0.03,
            moderate_reward_gap: 3.0,
            reward_gap: 10.0,
            efficiency_gap: 0.15,
        }
    }
}

/// A choice plus the criterion that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Judgment {
    pub choice: PreferenceChoice,
    pub reason: &'static str,
}

impl Judgment {
    fn first_if(first_better: bool, reason: &'static str) -> Self {
        let choice = if first_better {
            PreferenceChoice::PreferFirst
        } else {
            PreferenceChoice::PreferSecond
        };
        Self { choice, reason }
    }

    fn tie() -> Self {
        Self {
            choice: PreferenceChoice::Tie,
            reason: "no decisive difference",
        }
    }
}

/// Reward gap that makes best against worst worth judging
pub const PAIR_REWARD_GAP: f64 = 2.0;

/// Efficiency gap that makes two mid-ranked neighbours worth judging
pub const PAIR_EFFICIENCY_GAP: f64 = 0.1;

/// Source of pairwise judgments during iterative training
pub trait PreferenceJudge {
    fn judge_pair(&mut self, first: &Trajectory, second: &Trajectory) -> PreferenceChoice;

    /// Pairs worth asking about, at most `max_pairs`
    fn select_pairs<'a>(
        &self,
        trajectories: &'a [Trajectory],
        max_pairs: usize,
    ) -> Vec<(&'a Trajectory, &'a Trajectory)> {
        interesting_pairs(trajectories, max_pairs)
    }
}

/// Best against worst when their rewards differ by more than
/// [`PAIR_REWARD_GAP`], and the two trajectories around the median reward
/// when their efficiencies differ by more than [`PAIR_EFFICIENCY_GAP`].
pub fn interesting_pairs(
    trajectories: &[Trajectory],
    max_pairs: usize,
) -> Vec<(&Trajectory, &Trajectory)> {
    if trajectories.len() < 2 {
        return Vec::new();
    }
    let mut ranked: Vec<&Trajectory> = trajectories.iter().collect();
    ranked.sort_by(|a, b| b.total_reward().total_cmp(&a.total_reward()));

    let mut pairs = Vec::new();
    let (best, worst) = (ranked[0], ranked[ranked.len() - 1]);
    if (best.total_reward() - worst.total_reward()).abs() > PAIR_REWARD_GAP {
        pairs.push((best, worst));
    }

    let middle = ranked.len() / 2;
    if middle > 0 && middle + 1 < ranked.len() {
        let (a, b) = (ranked[middle], ranked[middle + 1]);
        if (a.efficiency() - b.efficiency()).abs() > PAIR_EFFICIENCY_GAP {
            pairs.push((a, b));
        }
    }

    pairs.truncate(max_pairs);
    pairs
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicJudge {
    config: JudgeConfig,
}

impl HeuristicJudge {
    pub fn new(config: JudgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Reached the goal when observations are recorded, otherwise ended with
    /// positive total reward
    pub fn is_success(&self, trajectory: &Trajectory) -> bool {
        match trajectory.max_observation(self.config.progress_dim) {
            Some(max) => max >= self.config.goal,
            None => trajectory.total_reward() > 0.0,
        }
    }

    fn progress(&self, trajectory: &Trajectory) -> f64 {
        trajectory
            .max_observation(self.config.progress_dim)
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn judge(&self, a: &Trajectory, b: &Trajectory) -> Judgment {
        let c = &self.config;
        let (a_ok, b_ok) = (self.is_success(a), self.is_success(b));

        if a_ok != b_ok {
            return Judgment::first_if(a_ok, "success over failure");
        }

        if a_ok && a.len().abs_diff(b.len()) > c.length_margin {
            return Judgment::first_if(a.len() < b.len(), "shorter success");
        }

        let reward_diff = (a.total_reward() - b.total_reward()).abs();

        if !a_ok {
            let (pa, pb) = (self.progress(a), self.progress(b));
            let progress_diff = (pa - pb).abs();
            if progress_diff > c.strong_progress_gap {
                return Judgment::first_if(pa > pb, "climbed higher");
            }
            if progress_diff > c.moderate_progress_gap && reward_diff > c.moderate_reward_gap {
                return Judgment::first_if(
                    a.total_reward() > b.total_reward(),
                    "climbed higher with better reward",
                );
            }
        }

        if reward_diff > c.reward_gap {
            return Judgment::first_if(a.total_reward() > b.total_reward(), "higher total reward");
        }

        let (ea, eb) = (a.efficiency(), b.efficiency());
        if (ea - eb).abs() > c.efficiency_gap {
            return Judgment::first_if(ea > eb, "more efficient");
        }

        Judgment::tie()
    }

    /// Judge a pair and build the record for it
    pub fn label(&self, a: &Trajectory, b: &Trajectory) -> PreferenceRecord {
        let judgment = self.judge(a, b);
        debug!(
            trajectory_a = a.episode_id(),
            trajectory_b = b.episode_id(),
            choice = %judgment.choice,
            reason = judgment.reason,
            "Auto-labelled pair"
        );
        PreferenceRecord::from_pair(a, b, judgment.choice)
            .with_auto_selected(true)
            .with_reasoning(judgment.reason)
    }

    /// Up to `max_pairs` pairs with strong contrast, in this order: success
    /// against failure, best against worst within the successes, highest
    /// against lowest climb within the failures, then evenly strided pairs
    /// across the ranking.
    pub fn contrast_pairs<'a>(
        &self,
        trajectories: &'a [Trajectory],
        max_pairs: usize,
    ) -> Vec<(&'a Trajectory, &'a Trajectory)> {
        let mut ranked: Vec<&Trajectory> = trajectories.iter().collect();
        // success first, then higher reward, then shorter
        ranked.sort_by(|a, b| {
            self.is_success(b)
                .cmp(&self.is_success(a))
                .then_with(|| b.total_reward().total_cmp(&a.total_reward()))
                .then_with(|| a.len().cmp(&b.len()))
        });

        let (successes, failures): (Vec<&Trajectory>, Vec<&Trajectory>) =
            ranked.iter().copied().partition(|t| self.is_success(t));

        let mut pairs = Vec::new();

        let contrasted = successes.len().min(failures.len()).min(max_pairs / 2);
        pairs.extend((0..contrasted).map(|i| (successes[i], failures[i])));

        pairs.extend(extremes(&successes, max_pairs / 4));

        let mut by_progress = failures.clone();
        by_progress.sort_by(|a, b| self.progress(b).total_cmp(&self.progress(a)));
        pairs.extend(extremes(&by_progress, max_pairs / 4));

        let remaining = max_pairs.saturating_sub(pairs.len());
        if remaining > 0 && ranked.len() >= 2 {
            let stride = (ranked.len() / (remaining + 1)).max(2);
            let mut i = 0;
            while i + stride < ranked.len() && pairs.len() < max_pairs {
                pairs.push((ranked[i], ranked[i + stride]));
                i += stride;
            }
        }

        pairs.truncate(max_pairs);
        pairs
    }

    /// Select contrastive pairs and label each one
    pub fn label_contrast_pairs(
        &self,
        trajectories: &[Trajectory],
        max_pairs: usize,
    ) -> Vec<PreferenceRecord> {
        self.contrast_pairs(trajectories, max_pairs)
            .into_iter()
            .map(|(a, b)| self.label(a, b))
            .collect()
    }
}

impl PreferenceJudge for HeuristicJudge {
    fn judge_pair(&mut self, first: &Trajectory, second: &Trajectory) -> PreferenceChoice {
        self.label(first, second).choice
    }

    fn select_pairs<'a>(
        &self,
        trajectories: &'a [Trajectory],
        max_pairs: usize,
    ) -> Vec<(&'a Trajectory, &'a Trajectory)> {
        self.contrast_pairs(trajectories, max_pairs)
    }
}

// Best against worst, second best against second worst, ... for groups of
// at least four
fn extremes<'a>(group: &[&'a Trajectory], limit: usize) -> Vec<(&'a Trajectory, &'a Trajectory)> {
    if group.len() < 4 {
        return Vec::new();
    }
    let n = group.len();
    (0..(n / 2).min(limit))
        .map(|i| (group[i], group[n - 1 - i]))
        .collect()
}
