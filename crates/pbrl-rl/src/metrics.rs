//! Per-episode training metrics and greedy evaluation statistics

use serde::{Deserialize, Serialize};

use pbrl_core::Reward;

/// One completed rollout episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    pub episode: usize,
    pub total_reward: Reward,
    pub steps: usize,
    pub reached_goal: bool,
    /// Exploration rate in effect during the episode
    pub epsilon: f64,
}

/// Accumulated rollout history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    episodes: Vec<EpisodeMetrics>,
}

impl TrainingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metrics: EpisodeMetrics) {
        self.episodes.push(metrics);
    }

    pub fn episodes(&self) -> &[EpisodeMetrics] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn rewards(&self) -> Vec<Reward> {
        self.episodes.iter().map(|e| e.total_reward).collect()
    }

    pub fn total_steps(&self) -> usize {
        self.episodes.iter().map(|e| e.steps).sum()
    }

    /// Mean reward over the last `window` episodes
    pub fn recent_average(&self, window: usize) -> f64 {
        let start = self.episodes.len().saturating_sub(window.max(1));
        let recent = &self.episodes[start..];
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|e| e.total_reward).sum::<f64>() / recent.len() as f64
    }

    /// Fraction of episodes that reached the goal over the last `window`
    pub fn success_rate(&self, window: usize) -> f64 {
        let start = self.episodes.len().saturating_sub(window.max(1));
        let recent = &self.episodes[start..];
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().filter(|e| e.reached_goal).count() as f64 / recent.len() as f64
    }
}

/// Greedy-policy evaluation summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStats {
    pub episodes: usize,
    pub mean_reward: f64,
    pub std_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
    pub mean_length: f64,
    pub std_length: f64,
    pub success_rate: f64,
}

impl EvaluationStats {
    /// Summarize `(reward, length, reached_goal)` per episode. All zero when
    /// there are no episodes.
    pub fn from_episodes(episodes: &[(Reward, usize, bool)]) -> Self {
        if episodes.is_empty() {
            return Self::default();
        }

        let rewards: Vec<f64> = episodes.iter().map(|e| e.0).collect();
        let lengths: Vec<f64> = episodes.iter().map(|e| e.1 as f64).collect();
        let (mean_reward, std_reward) = mean_std(&rewards);
        let (mean_length, std_length) = mean_std(&lengths);
        let successes = episodes.iter().filter(|e| e.2).count();

        Self {
            episodes: episodes.len(),
            mean_reward,
            std_reward,
            min_reward: rewards.iter().copied().fold(f64::INFINITY, f64::min),
            max_reward: rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_length,
            std_length,
            success_rate: successes as f64 / episodes.len() as f64,
        }
    }
}

// Population standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(n: usize, reward: f64, reached_goal: bool) -> EpisodeMetrics {
        EpisodeMetrics {
            episode: n,
            total_reward: reward,
            steps: 10,
            reached_goal,
            epsilon: 1.0,
        }
    }

    #[test]
    fn test_recent_average_and_success_rate() {
        let mut metrics = TrainingMetrics::new();
        assert_eq!(metrics.recent_average(100), 0.0);
        assert_eq!(metrics.success_rate(100), 0.0);

        for (i, r) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            metrics.record(episode(i, r, i % 2 == 1));
        }

        assert_eq!(metrics.recent_average(2), 3.5);
        assert_eq!(metrics.recent_average(100), 2.5);
        assert_eq!(metrics.success_rate(4), 0.5);
        assert_eq!(metrics.total_steps(), 40);
        assert_eq!(metrics.rewards(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_evaluation_stats() {
        let stats = EvaluationStats::from_episodes(&[(2.0, 10, true), (4.0, 20, false)]);
        assert_eq!(stats.episodes, 2);
        assert_eq!(stats.mean_reward, 3.0);
        assert_eq!(stats.std_reward, 1.0);
        assert_eq!(stats.min_reward, 2.0);
        assert_eq!(stats.max_reward, 4.0);
        assert_eq!(stats.mean_length, 15.0);
        assert_eq!(stats.std_length, 5.0);
        assert_eq!(stats.success_rate, 0.5);
    }

    #[test]
    fn test_evaluation_stats_empty() {
        assert_eq!(EvaluationStats::from_episodes(&[]), EvaluationStats::default());
    }
}
