//! Training engine - sequences preference seeding and rollout training
//!
//! Phases move forward only:
//! `Init -> PreferenceSeeding (optional) -> RolloutTraining -> Terminal`.
//! The engine owns the value table for the whole run; every update lands in
//! the table before control returns, so a run aborted by an environment
//! error still leaves a usable table behind.
//!
//! [`TrainingEngine::train_with_feedback`] interleaves rollout training with
//! rounds of judged trajectory pairs; judgments are folded in through
//! [`TrainingEngine::apply_preference`], which stays available until the run
//! finishes.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pbrl_core::{
    ActionId, PbrlError, PreferenceChoice, PreferenceRecord, Result, Reward, RunId, Trajectory,
    TrajectoryId, TrajectoryStep,
};

use crate::config::{AgentConfig, FeedbackConfig};
use crate::credit::{PreferenceCredit, PreferenceSummary, PreferenceUpdate, SeedingReport};
use crate::env::Environment;
use crate::judge::PreferenceJudge;
use crate::metrics::{EpisodeMetrics, EvaluationStats, TrainingMetrics};
use crate::persistence::ValueSnapshot;
use crate::state::StateMapper;
use crate::value_store::ValueStore;

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    Init,
    PreferenceSeeding,
    RolloutTraining,
    Terminal,
}

impl std::fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrainingPhase::Init => "init",
            TrainingPhase::PreferenceSeeding => "preference_seeding",
            TrainingPhase::RolloutTraining => "rollout_training",
            TrainingPhase::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// What a finished run exposes for persistence and reporting
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: RunId,
    pub snapshot: ValueSnapshot,
    pub metrics: TrainingMetrics,
    pub seeding: Option<SeedingReport>,
    pub preference_summary: Option<PreferenceSummary>,
}

/// One round of [`TrainingEngine::train_with_feedback`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRound {
    /// 1-based
    pub round: usize,
    pub episodes: usize,
    pub avg_reward: f64,
    pub trajectories: usize,
    pub pairs: usize,
    pub applied: usize,
    pub ties: usize,
    /// Preference updates applied so far in the run, this round included
    pub preference_updates: usize,
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub run_id: RunId,
    pub phase: TrainingPhase,
    pub episodes: usize,
    pub total_steps: usize,
    pub td_updates: u64,
    pub preference_updates: usize,
    pub epsilon: f64,
    pub recent_average_reward: f64,
}

/// Owns the value store, the state mapper and the credit assigner for one run
#[derive(Debug)]
pub struct TrainingEngine<M: StateMapper> {
    run_id: RunId,
    config: AgentConfig,
    mapper: M,
    store: ValueStore,
    credit: PreferenceCredit,
    metrics: TrainingMetrics,
    seeding: Option<SeedingReport>,
    restored_rewards: Vec<Reward>,
    phase: TrainingPhase,
}

impl<M: StateMapper> TrainingEngine<M> {
    /// Fresh zero table sized by the mapper and `config.n_actions`
    pub fn new(config: AgentConfig, mapper: M) -> Result<Self> {
        config.check()?;
        check_layout(&config, &mapper)?;

        let mut store =
            ValueStore::new(mapper.n_states(), config.n_actions, config.hyperparameters.clone())?;
        if let Some(seed) = config.training.seed {
            store = store.with_seed(seed);
        }

        Self::assemble(RunId::new(), config, mapper, store, Vec::new())
    }

    /// Resume from a persisted table. The table shape must match the mapper
    /// and action count; hyperparameters and epsilon come from the snapshot.
    pub fn from_snapshot(config: AgentConfig, mapper: M, snapshot: ValueSnapshot) -> Result<Self> {
        config.check()?;
        check_layout(&config, &mapper)?;
        snapshot.check_shape((mapper.n_states(), config.n_actions))?;
        if let (Some(saved), Some(actual)) = (&snapshot.discretization, mapper.discretization()) {
            if saved.bin_counts() != actual.bin_counts() {
                return Err(PbrlError::DataIntegrity(format!(
                    "snapshot grid {:?} does not match discretizer grid {:?}",
                    saved.bin_counts(),
                    actual.bin_counts()
                )));
            }
        }

        let mut store = snapshot.to_store()?;
        if let Some(seed) = config.training.seed {
            store = store.with_seed(seed);
        }

        info!(
            run_id = %snapshot.run_id,
            epsilon = snapshot.epsilon,
            "Resuming from value snapshot"
        );
        Self::assemble(snapshot.run_id, config, mapper, store, snapshot.training_rewards)
    }

    fn assemble(
        run_id: RunId,
        config: AgentConfig,
        mapper: M,
        store: ValueStore,
        restored_rewards: Vec<Reward>,
    ) -> Result<Self> {
        let credit = PreferenceCredit::new(&config.preference)?;
        debug!(
            %run_id,
            n_states = store.n_states(),
            n_actions = store.n_actions(),
            "Training engine initialized"
        );
        Ok(Self {
            run_id,
            config,
            mapper,
            store,
            credit,
            metrics: TrainingMetrics::new(),
            seeding: None,
            restored_rewards,
            phase: TrainingPhase::Init,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn seeding_report(&self) -> Option<&SeedingReport> {
        self.seeding.as_ref()
    }

    pub fn preference_summary(&self) -> Option<PreferenceSummary> {
        self.credit.summary()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            run_id: self.run_id,
            phase: self.phase,
            episodes: self.metrics.len(),
            total_steps: self.metrics.total_steps(),
            td_updates: self.store.update_count(),
            preference_updates: self.credit.update_count(),
            epsilon: self.store.epsilon(),
            recent_average_reward: self
                .metrics
                .recent_average(self.config.training.average_window),
        }
    }

    fn enter(&mut self, next: TrainingPhase) -> Result<()> {
        if next < self.phase {
            return Err(PbrlError::InvalidPhase(format!(
                "cannot enter {next} from {}",
                self.phase
            )));
        }
        if next != self.phase {
            info!(from = %self.phase, to = %next, "Training phase transition");
            self.phase = next;
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.phase == TrainingPhase::Terminal {
            return Err(PbrlError::InvalidPhase("run already finished".to_string()));
        }
        Ok(())
    }

    /// Apply every record once, before any rollout training
    pub fn seed_preferences(
        &mut self,
        records: &[PreferenceRecord],
        trajectories: &[Trajectory],
    ) -> Result<SeedingReport> {
        self.enter(TrainingPhase::PreferenceSeeding)?;
        let report = self
            .credit
            .seed(&mut self.store, &self.mapper, records, trajectories)?;

        self.seeding
            .get_or_insert_with(SeedingReport::default)
            .merge(&report);

        Ok(report)
    }

    /// Apply a single judgment with an explicit strength. Allowed until the
    /// run finishes, so judgments collected between training rounds can be
    /// folded in.
    pub fn apply_preference(
        &mut self,
        preferred: &Trajectory,
        less_preferred: &Trajectory,
        strength: f64,
    ) -> Result<PreferenceUpdate> {
        self.ensure_active()?;
        if self.phase == TrainingPhase::Init {
            self.enter(TrainingPhase::PreferenceSeeding)?;
        }
        self.credit
            .apply_preference(&mut self.store, &self.mapper, preferred, less_preferred, strength)
    }

    /// Epsilon-greedy (or greedy when `training` is false) action for an observation
    pub fn select_action(&mut self, observation: &M::Observation, training: bool) -> Result<ActionId> {
        let state = self.mapper.state_id(observation)?;
        self.store.select_action(state, training)
    }

    /// One TD update from a live transition; returns the TD error
    pub fn observe(
        &mut self,
        observation: &M::Observation,
        action: ActionId,
        reward: Reward,
        next_observation: &M::Observation,
        done: bool,
    ) -> Result<f64> {
        self.ensure_active()?;
        self.enter(TrainingPhase::RolloutTraining)?;
        let state = self.mapper.state_id(observation)?;
        let next_state = self.mapper.state_id(next_observation)?;
        self.store.update(state, action, reward, next_state, done)
    }

    /// Run `episodes` training episodes, decaying epsilon after each one
    pub fn train<E>(&mut self, env: &mut E, episodes: usize) -> Result<&[EpisodeMetrics]>
    where
        E: Environment<Observation = M::Observation>,
    {
        self.check_env(env)?;
        self.enter(TrainingPhase::RolloutTraining)?;

        let start = self.metrics.len();
        let log_interval = self.config.training.log_interval;
        let window = self.config.training.average_window;

        info!(episodes, epsilon = self.store.epsilon(), "Starting rollout training");

        for _ in 0..episodes {
            let done_episodes = self.run_episode(env)?.episode + 1;

            if log_interval > 0 && done_episodes % log_interval == 0 {
                info!(
                    episode = done_episodes,
                    avg_reward = self.metrics.recent_average(window),
                    success_rate = self.metrics.success_rate(window),
                    epsilon = self.store.epsilon(),
                    "Training progress"
                );
            }
        }

        info!(
            episodes,
            avg_reward = self.metrics.recent_average(window),
            "Rollout training complete"
        );
        Ok(&self.metrics.episodes()[start..])
    }

    /// [`Self::train`] for the configured `training.episodes`
    pub fn train_configured<E>(&mut self, env: &mut E) -> Result<&[EpisodeMetrics]>
    where
        E: Environment<Observation = M::Observation>,
    {
        let episodes = self.config.training.episodes;
        self.train(env, episodes)
    }

    /// One epsilon-greedy episode with TD updates, bounded by `max_steps`.
    /// The episode is recorded in [`Self::metrics`].
    pub fn run_episode<E>(&mut self, env: &mut E) -> Result<EpisodeMetrics>
    where
        E: Environment<Observation = M::Observation>,
    {
        self.ensure_active()?;
        self.check_env(env)?;
        self.enter(TrainingPhase::RolloutTraining)?;

        let observation = env.reset()?;
        let mut state = self.mapper.state_id(&observation)?;
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut reached_goal = env.is_success(&observation);

        for _ in 0..self.config.training.max_steps {
            let action = self.store.select_action(state, true)?;
            let outcome = env.step(action)?;
            let next_state = self.mapper.state_id(&outcome.observation)?;
            let done = outcome.done();

            self.store
                .update(state, action, outcome.reward, next_state, done)?;

            total_reward += outcome.reward;
            steps += 1;
            reached_goal |= env.is_success(&outcome.observation);
            state = next_state;

            if done {
                break;
            }
        }

        let epsilon = self.store.epsilon();
        self.store.decay_epsilon();
        debug!(
            steps,
            total_reward,
            reached_goal,
            final_state = state,
            "Episode finished"
        );

        let metrics = EpisodeMetrics {
            episode: self.metrics.len(),
            total_reward,
            steps,
            reached_goal,
            epsilon,
        };
        self.metrics.record(metrics.clone());
        Ok(metrics)
    }

    /// Alternate rollout training with judged feedback. Each round trains,
    /// collects trajectories with the current policy, asks `judge` about the
    /// pairs it selects and applies every non-tie answer at the configured
    /// strength.
    pub fn train_with_feedback<E, J>(
        &mut self,
        env: &mut E,
        judge: &mut J,
        feedback: &FeedbackConfig,
    ) -> Result<Vec<FeedbackRound>>
    where
        E: Environment<Observation = M::Observation>,
        J: PreferenceJudge + ?Sized,
    {
        feedback.check()?;
        self.check_env(env)?;
        let mut rounds = Vec::with_capacity(feedback.rounds);

        for round in 0..feedback.rounds {
            let trained = self.train(env, feedback.episodes_per_round)?;
            let avg_reward = if trained.is_empty() {
                0.0
            } else {
                trained.iter().map(|m| m.total_reward).sum::<f64>() / trained.len() as f64
            };

            let first_id = (round * feedback.trajectories_per_round) as TrajectoryId;
            let trajectories = (0..feedback.trajectories_per_round)
                .map(|i| {
                    self.collect_trajectory(env, first_id + i as TrajectoryId, feedback.explore)
                })
                .collect::<Result<Vec<_>>>()?;

            let pairs = judge.select_pairs(&trajectories, feedback.max_pairs);
            let mut applied = 0;
            let mut ties = 0;
            for &(first, second) in &pairs {
                let (preferred, other) = match judge.judge_pair(first, second) {
                    PreferenceChoice::Tie => {
                        ties += 1;
                        continue;
                    }
                    PreferenceChoice::PreferFirst => (first, second),
                    PreferenceChoice::PreferSecond => (second, first),
                };
                self.apply_preference(preferred, other, feedback.strength)?;
                applied += 1;
            }

            let summary = FeedbackRound {
                round: round + 1,
                episodes: feedback.episodes_per_round,
                avg_reward,
                trajectories: trajectories.len(),
                pairs: pairs.len(),
                applied,
                ties,
                preference_updates: self.credit.update_count(),
            };
            info!(
                round = summary.round,
                avg_reward,
                pairs = summary.pairs,
                applied,
                "Feedback round complete"
            );
            rounds.push(summary);
        }

        Ok(rounds)
    }

    /// Greedy rollouts without learning or epsilon decay
    pub fn evaluate<E>(&self, env: &mut E, episodes: usize) -> Result<EvaluationStats>
    where
        E: Environment<Observation = M::Observation>,
    {
        self.check_env(env)?;
        let mut results = Vec::with_capacity(episodes);

        for _ in 0..episodes {
            let mut observation = env.reset()?;
            let mut total_reward = 0.0;
            let mut steps = 0;
            let mut reached_goal = env.is_success(&observation);

            for _ in 0..self.config.training.max_steps {
                let state = self.mapper.state_id(&observation)?;
                let outcome = env.step(self.store.greedy_action(state)?)?;
                total_reward += outcome.reward;
                steps += 1;
                reached_goal |= env.is_success(&outcome.observation);
                let done = outcome.done();
                observation = outcome.observation;
                if done {
                    break;
                }
            }
            results.push((total_reward, steps, reached_goal));
        }

        let stats = EvaluationStats::from_episodes(&results);
        info!(
            episodes,
            mean_reward = stats.mean_reward,
            success_rate = stats.success_rate,
            "Evaluation complete"
        );
        Ok(stats)
    }

    /// Roll out the current policy and record it without learning. With
    /// `explore` the epsilon-greedy rule is used, otherwise pure greedy.
    /// Continuous mappers keep raw observations on every step.
    pub fn collect_trajectory<E>(
        &mut self,
        env: &mut E,
        episode_id: TrajectoryId,
        explore: bool,
    ) -> Result<Trajectory>
    where
        E: Environment<Observation = M::Observation>,
    {
        self.check_env(env)?;
        let mut observation = env.reset()?;
        let mut steps = Vec::new();

        for step_number in 0..self.config.training.max_steps {
            let state = self.mapper.state_id(&observation)?;
            let action = self.store.select_action(state, explore)?;
            let outcome = env.step(action)?;
            let next_state = self.mapper.state_id(&outcome.observation)?;
            let done = outcome.done();

            let step = match (
                self.mapper.raw_observation(&observation),
                self.mapper.raw_observation(&outcome.observation),
            ) {
                (Some(raw), Some(raw_next)) => {
                    TrajectoryStep::continuous(raw, action, outcome.reward, raw_next, done, step_number)
                        .with_state_ids(state, next_state)
                }
                _ => TrajectoryStep::discrete(
                    state,
                    action,
                    outcome.reward,
                    next_state,
                    done,
                    step_number,
                ),
            };
            steps.push(step);
            observation = outcome.observation;

            if done {
                break;
            }
        }

        let trajectory = Trajectory::new(episode_id, steps);
        debug!(
            episode_id,
            length = trajectory.len(),
            total_reward = trajectory.total_reward(),
            "Collected trajectory"
        );
        Ok(trajectory)
    }

    fn check_env<E: Environment>(&self, env: &E) -> Result<()> {
        if env.n_actions() != self.store.n_actions() {
            return Err(PbrlError::Config(format!(
                "environment has {} actions, value table has {}",
                env.n_actions(),
                self.store.n_actions()
            )));
        }
        Ok(())
    }

    /// Current table and bookkeeping as a persistable snapshot
    pub fn snapshot(&self) -> ValueSnapshot {
        let mut rewards = self.restored_rewards.clone();
        rewards.extend(self.metrics.rewards());
        ValueSnapshot::capture(
            self.run_id,
            &self.store,
            self.credit.preference_weight(),
            self.mapper.discretization(),
        )
        .with_preference_summary(self.credit.summary())
        .with_training_rewards(rewards)
    }

    /// Close the run. Further seeding or training is rejected; the table
    /// stays readable through [`Self::store`] and [`Self::snapshot`].
    pub fn finish(&mut self) -> Result<TrainingOutcome> {
        self.enter(TrainingPhase::Terminal)?;
        let outcome = TrainingOutcome {
            run_id: self.run_id,
            snapshot: self.snapshot(),
            metrics: self.metrics.clone(),
            seeding: self.seeding.clone(),
            preference_summary: self.credit.summary(),
        };
        info!(
            run_id = %self.run_id,
            episodes = self.metrics.len(),
            td_updates = self.store.update_count(),
            "Training run finished"
        );
        Ok(outcome)
    }

    pub fn into_store(self) -> ValueStore {
        self.store
    }
}

fn check_layout<M: StateMapper>(config: &AgentConfig, mapper: &M) -> Result<()> {
    if let (Some(expected), Some(actual)) = (&config.discretization, mapper.discretization()) {
        if expected.bin_counts() != actual.bin_counts() {
            return Err(PbrlError::Config(format!(
                "configured bins {:?} do not match discretizer bins {:?}",
                expected.bin_counts(),
                actual.bin_counts()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::env::StepOutcome;
    use crate::state::IdentityMapper;
    use pbrl_core::PreferenceChoice;

    /// Two-state task: action 1 in state 0 wins immediately
    struct Coin;

    impl Environment for Coin {
        type Observation = usize;

        fn n_actions(&self) -> usize {
            2
        }

        fn reset(&mut self) -> Result<usize> {
            Ok(0)
        }

        fn step(&mut self, action: ActionId) -> Result<StepOutcome<usize>> {
            Ok(if action == 1 {
                StepOutcome::new(1, 1.0, true, false)
            } else {
                StepOutcome::new(0, -0.1, false, false)
            })
        }

        fn is_success(&self, observation: &usize) -> bool {
            *observation == 1
        }
    }

    fn engine() -> TrainingEngine<IdentityMapper> {
        let config = AgentConfig {
            n_actions: 2,
            ..AgentConfig::taxi().with_seed(3)
        };
        TrainingEngine::new(config, IdentityMapper::new(2).unwrap()).unwrap()
    }

    #[test]
    fn test_engine_starts_in_init() {
        let engine = engine();
        assert_eq!(engine.phase(), TrainingPhase::Init);
        assert_eq!(engine.store().shape(), (2, 2));
        assert_eq!(engine.stats().td_updates, 0);
    }

    #[test]
    fn test_phase_ordering() {
        assert!(TrainingPhase::Init < TrainingPhase::PreferenceSeeding);
        assert!(TrainingPhase::PreferenceSeeding < TrainingPhase::RolloutTraining);
        assert!(TrainingPhase::RolloutTraining < TrainingPhase::Terminal);
    }

    #[test]
    fn test_seeding_after_training_rejected() {
        let mut engine = engine();
        engine.train(&mut Coin, 5).unwrap();
        assert_eq!(engine.phase(), TrainingPhase::RolloutTraining);

        let err = engine.seed_preferences(&[], &[]).unwrap_err();
        assert!(matches!(err, PbrlError::InvalidPhase(_)));
    }

    #[test]
    fn test_single_episodes_advance_phase_and_record() {
        let mut engine = engine();
        engine.run_episode(&mut Coin).unwrap();
        engine.run_episode(&mut Coin).unwrap();

        assert_eq!(engine.phase(), TrainingPhase::RolloutTraining);
        assert_eq!(engine.metrics().len(), 2);
        assert_eq!(engine.metrics().episodes()[1].episode, 1);
        assert_eq!(engine.snapshot().training_rewards.len(), 2);

        let err = engine.seed_preferences(&[], &[]).unwrap_err();
        assert!(matches!(err, PbrlError::InvalidPhase(_)));
    }

    #[test]
    fn test_observe_enters_rollout_training() {
        let mut engine = engine();
        engine.observe(&0, 1, 1.0, &1, true).unwrap();
        assert_eq!(engine.phase(), TrainingPhase::RolloutTraining);
        assert!(engine.seed_preferences(&[], &[]).is_err());
    }

    #[test]
    fn test_train_configured_uses_episode_count() {
        let mut config = AgentConfig {
            n_actions: 2,
            ..AgentConfig::taxi().with_seed(3)
        };
        config.training.episodes = 7;
        config.training.log_interval = 0;
        let mut engine = TrainingEngine::new(config, IdentityMapper::new(2).unwrap()).unwrap();

        let episodes = engine.train_configured(&mut Coin).unwrap();
        assert_eq!(episodes.len(), 7);
        assert_eq!(engine.stats().episodes, 7);
    }

    #[test]
    fn test_snapshot_grid_must_match() {
        use crate::config::DiscretizationConfig;
        use crate::discretizer::GridDiscretizer;

        let narrow = AgentConfig {
            discretization: Some(DiscretizationConfig::mountain_car(10, 40)),
            ..AgentConfig::mountain_car()
        };
        let saved = TrainingEngine::new(narrow, GridDiscretizer::mountain_car(10, 40).unwrap())
            .unwrap()
            .snapshot();

        // same row count, different layout
        let err = TrainingEngine::from_snapshot(
            AgentConfig::mountain_car(),
            GridDiscretizer::mountain_car(20, 20).unwrap(),
            saved.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, PbrlError::DataIntegrity(_)));

        let narrow = AgentConfig {
            discretization: Some(DiscretizationConfig::mountain_car(10, 40)),
            ..AgentConfig::mountain_car()
        };
        assert!(TrainingEngine::from_snapshot(
            narrow,
            GridDiscretizer::mountain_car(10, 40).unwrap(),
            saved
        )
        .is_ok());
    }

    #[test]
    fn test_training_learns_winning_action() {
        let mut engine = engine();
        let episodes = engine.train(&mut Coin, 300).unwrap();
        assert_eq!(episodes.len(), 300);

        assert_eq!(engine.store().greedy_action(0).unwrap(), 1);
        let stats = engine.evaluate(&mut Coin, 5).unwrap();
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.mean_length, 1.0);
    }

    #[test]
    fn test_epsilon_decays_once_per_episode() {
        let mut engine = engine();
        engine.train(&mut Coin, 2).unwrap();
        assert!((engine.store().epsilon() - 0.995_f64.powi(2)).abs() < 1e-12);
        assert_eq!(engine.metrics().episodes()[1].epsilon, 0.995);
    }

    #[test]
    fn test_finish_blocks_further_updates() {
        let mut engine = engine();
        let t = Trajectory::new(1, vec![TrajectoryStep::discrete(0, 1, 1.0, 1, true, 0)]);
        let records = vec![PreferenceRecord::new(1, 2, PreferenceChoice::PreferFirst)];
        let report = engine
            .seed_preferences(&records, std::slice::from_ref(&t))
            .unwrap();
        assert_eq!(report.skipped_missing, 1);

        let outcome = engine.finish().unwrap();
        assert_eq!(outcome.seeding.unwrap().skipped_missing, 1);
        assert_eq!(engine.phase(), TrainingPhase::Terminal);
        assert!(engine.train(&mut Coin, 1).is_err());
        assert!(engine.apply_preference(&t, &t, 1.0).is_err());
        assert!(engine.observe(&0, 0, 0.0, &1, true).is_err());
    }

    #[test]
    fn test_collect_trajectory_greedy() {
        let mut engine = engine();
        let mut env = Coin;
        let before = engine.store().update_count();
        let trajectory = engine.collect_trajectory(&mut env, 42, false).unwrap();
        // all-zero table picks action 0, which never terminates
        assert_eq!(trajectory.len(), engine.config().training.max_steps);
        assert_eq!(trajectory.episode_id(), 42);
        assert_eq!(engine.store().update_count(), before);
    }

    #[test]
    fn test_env_action_mismatch() {
        // six-action config against a two-action environment
        let mut engine =
            TrainingEngine::new(AgentConfig::taxi(), IdentityMapper::new(2).unwrap()).unwrap();
        assert!(matches!(engine.train(&mut Coin, 1), Err(PbrlError::Config(_))));
        assert_eq!(engine.phase(), TrainingPhase::Init);
    }
}
