//! Integration tests for the training engine
//!
//! These tests drive the engine end to end against small toy environments:
//! a discrete chain walk and a continuous line with momentum.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

use pbrl_core::{
    ActionId, PbrlError, PreferenceChoice, PreferenceRecord, Result, Trajectory, TrajectoryStep,
};
use pbrl_rl::persistence::{load_preferences, save_preferences};
use pbrl_rl::{
    AgentConfig, Environment, FeedbackConfig, GridDiscretizer, HeuristicJudge, IdentityMapper,
    PreferenceJudge, StepOutcome, TrainingEngine, TrainingPhase, ValueSnapshot,
};

/// States `0..len`; action 1 moves right, action 0 moves left. Every step
/// costs 1, reaching the last state pays 10 and ends the episode.
struct ChainWalk {
    len: usize,
    position: usize,
}

impl ChainWalk {
    fn new(len: usize) -> Self {
        Self { len, position: 0 }
    }
}

impl Environment for ChainWalk {
    type Observation = usize;

    fn n_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<usize> {
        self.position = 0;
        Ok(0)
    }

    fn step(&mut self, action: ActionId) -> Result<StepOutcome<usize>> {
        self.position = match action {
            1 => (self.position + 1).min(self.len - 1),
            _ => self.position.saturating_sub(1),
        };
        let at_goal = self.position == self.len - 1;
        let reward = if at_goal { 10.0 } else { -1.0 };
        Ok(StepOutcome::new(self.position, reward, at_goal, false))
    }

    fn is_success(&self, observation: &usize) -> bool {
        *observation == self.len - 1
    }
}

/// Chain walk whose step fails once `fail_at` steps have been taken
struct FlakyChain {
    inner: ChainWalk,
    steps: usize,
    fail_at: usize,
}

impl Environment for FlakyChain {
    type Observation = usize;

    fn n_actions(&self) -> usize {
        self.inner.n_actions()
    }

    fn reset(&mut self) -> Result<usize> {
        self.inner.reset()
    }

    fn step(&mut self, action: ActionId) -> Result<StepOutcome<usize>> {
        self.steps += 1;
        if self.steps >= self.fail_at {
            return Err(PbrlError::environment("simulator lost connection"));
        }
        self.inner.step(action)
    }
}

/// Position/velocity line; action 0 pushes left, 1 coasts, 2 pushes right.
/// Reaching position 0.5 ends the episode.
struct Line {
    position: f64,
    velocity: f64,
}

impl Line {
    fn new() -> Self {
        Self {
            position: -0.5,
            velocity: 0.0,
        }
    }
}

impl Environment for Line {
    type Observation = Vec<f64>;

    fn n_actions(&self) -> usize {
        3
    }

    fn reset(&mut self) -> Result<Vec<f64>> {
        *self = Self::new();
        Ok(vec![self.position, self.velocity])
    }

    fn step(&mut self, action: ActionId) -> Result<StepOutcome<Vec<f64>>> {
        self.velocity = (self.velocity + (action as f64 - 1.0) * 0.01).clamp(-0.07, 0.07);
        self.position = (self.position + self.velocity).clamp(-1.2, 0.6);
        let reached = self.position >= 0.5;
        Ok(StepOutcome::new(
            vec![self.position, self.velocity],
            -1.0,
            reached,
            false,
        ))
    }

    fn is_success(&self, observation: &Vec<f64>) -> bool {
        observation[0] >= 0.5
    }
}

fn chain_config(seed: u64) -> AgentConfig {
    let mut config = AgentConfig::taxi().with_seed(seed);
    config.n_actions = 2;
    config.training.max_steps = 50;
    config
}

fn chain_engine(len: usize, seed: u64) -> TrainingEngine<IdentityMapper> {
    TrainingEngine::new(chain_config(seed), IdentityMapper::new(len).unwrap()).unwrap()
}

fn line_engine(seed: u64) -> TrainingEngine<GridDiscretizer> {
    let grid = GridDiscretizer::mountain_car(20, 20).unwrap();
    TrainingEngine::new(AgentConfig::mountain_car().with_seed(seed), grid).unwrap()
}

#[test]
fn test_preference_seeding_shapes_greedy_policy() {
    let mut engine = chain_engine(5, 1);

    // walks straight to the goal
    let mut steps: Vec<TrajectoryStep> = (0..3)
        .map(|i| TrajectoryStep::discrete(i, 1, -1.0, i + 1, false, i))
        .collect();
    steps.push(TrajectoryStep::discrete(3, 1, 10.0, 4, true, 3));
    let direct = Trajectory::new(1, steps);

    // bumps against the left wall
    let stuck = Trajectory::new(
        2,
        (0..4)
            .map(|i| TrajectoryStep::discrete(0, 0, -1.0, 0, false, i))
            .collect(),
    );

    let records = vec![PreferenceRecord::from_pair(&stuck, &direct, PreferenceChoice::PreferSecond)];
    let report = engine
        .seed_preferences(&records, &[direct.clone(), stuck.clone()])
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.updated_steps, 8);
    assert_eq!(engine.phase(), TrainingPhase::PreferenceSeeding);
    assert_eq!(engine.store().greedy_action(0).unwrap(), 1);
    assert!(engine.store().value(3, 1).unwrap() > 0.0);
    assert!(engine.store().value(0, 0).unwrap() < engine.store().value(0, 1).unwrap());

    let summary = engine.preference_summary().unwrap();
    assert_eq!(summary.total_updates, 1);
    assert_eq!(summary.reward_differences, vec![direct.total_reward() - stuck.total_reward()]);
}

#[test]
fn test_full_pipeline_on_chain_walk() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = ChainWalk::new(5);
    let mut engine = chain_engine(5, 7);

    // exploratory rollouts, auto-labelled, written and read back
    let trajectories: Vec<Trajectory> = (0..8)
        .map(|id| engine.collect_trajectory(&mut env, id, true).unwrap())
        .collect();
    let judge = HeuristicJudge::default();
    let records = judge.label_contrast_pairs(&trajectories, 6);
    let path = dir.path().join("preferences.json");
    save_preferences(&path, &records).unwrap();
    let records = load_preferences(&path).unwrap();

    let report = engine.seed_preferences(&records, &trajectories).unwrap();
    assert_eq!(report.total_records, records.len());
    assert_eq!(report.applied + report.ties, records.len());
    assert_eq!(report.skipped(), 0);

    engine.train(&mut env, 300).unwrap();
    assert_eq!(engine.phase(), TrainingPhase::RolloutTraining);
    assert_eq!(engine.metrics().len(), 300);

    let stats = engine.evaluate(&mut env, 3).unwrap();
    assert_eq!(stats.success_rate, 1.0);
    assert_eq!(stats.mean_length, 4.0);
    assert_eq!(stats.mean_reward, 7.0);

    let outcome = engine.finish().unwrap();
    assert_eq!(outcome.seeding.unwrap().total_records, records.len());

    let snapshot_path = dir.path().join("q_table.json");
    outcome.snapshot.save(&snapshot_path).unwrap();
    let loaded = ValueSnapshot::load_expecting(&snapshot_path, (5, 2)).unwrap();
    assert_eq!(loaded.training_rewards.len(), 300);

    let resumed =
        TrainingEngine::from_snapshot(chain_config(7), IdentityMapper::new(5).unwrap(), loaded)
            .unwrap();
    assert_eq!(resumed.phase(), TrainingPhase::Init);
    assert_eq!(resumed.run_id(), outcome.run_id);
    assert_eq!(resumed.store().table(), engine.store().table());
    assert_eq!(resumed.store().epsilon(), engine.store().epsilon());
}

#[test]
fn test_environment_error_aborts_and_keeps_updates() {
    let mut engine = chain_engine(10, 3);
    let mut env = FlakyChain {
        inner: ChainWalk::new(10),
        steps: 0,
        fail_at: 5,
    };

    let err = engine.train(&mut env, 10).unwrap_err();

    assert!(matches!(err, PbrlError::Environment(_)));
    // four successful steps were applied before the failure
    assert_eq!(engine.store().update_count(), 4);
    assert!(engine.metrics().is_empty());
}

#[test]
fn test_snapshot_shape_must_match() {
    let engine = chain_engine(5, 1);
    let snapshot = engine.snapshot();

    let err = TrainingEngine::from_snapshot(chain_config(1), IdentityMapper::new(6).unwrap(), snapshot)
        .unwrap_err();
    assert!(matches!(err, PbrlError::ShapeMismatch { .. }));
}

#[test]
fn test_continuous_trajectory_credit() {
    let mut engine = line_engine(5);
    let mut env = Line::new();

    let a = engine.collect_trajectory(&mut env, 1, true).unwrap();
    let b = engine.collect_trajectory(&mut env, 2, true).unwrap();
    assert!(a.steps().iter().all(TrajectoryStep::is_continuous));

    let grid = engine.mapper().clone();
    for step in a.steps() {
        let obs = step.continuous_state.as_ref().unwrap();
        assert_eq!(step.state, grid.discretize(obs).unwrap());
    }

    let update = engine.apply_preference(&a, &b, 1.0).unwrap();
    assert_eq!(update.updated_steps, a.len() + b.len());
    assert_eq!(update.skipped_steps, 0);

    let first = &a.steps()[0];
    let state = grid.discretize(first.continuous_state.as_ref().unwrap()).unwrap();
    assert_ne!(engine.store().value(state, first.action).unwrap(), 0.0);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.discretization, Some(grid.config()));
    assert_eq!(snapshot.shape(), (400, 3));
}

#[test]
fn test_seeded_training_is_reproducible() {
    let run = || {
        let mut engine = line_engine(42);
        engine.train(&mut Line::new(), 20).unwrap();
        engine.into_store().into_table()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_ties_and_unknown_ids_leave_table_untouched() {
    let mut engine = chain_engine(5, 1);
    let t = Trajectory::new(1, vec![TrajectoryStep::discrete(0, 1, 1.0, 1, true, 0)]);
    let records = vec![
        PreferenceRecord::new(1, 1, PreferenceChoice::Tie),
        PreferenceRecord::new(1, 77, PreferenceChoice::PreferFirst),
    ];

    let report = engine.seed_preferences(&records, &[t]).unwrap();

    assert_eq!(report.ties, 1);
    assert_eq!(report.skipped_missing, 1);
    assert_eq!(report.missing_ids, vec![77]);
    assert_eq!(engine.store().update_count(), 0);
    assert!(engine.store().table().iter().all(|&v| v == 0.0));
}

/// Answers every question with a tie and counts the questions
#[derive(Default)]
struct Undecided {
    asked: usize,
}

impl PreferenceJudge for Undecided {
    fn judge_pair(&mut self, _first: &Trajectory, _second: &Trajectory) -> PreferenceChoice {
        self.asked += 1;
        PreferenceChoice::Tie
    }
}

fn feedback(rounds: usize) -> FeedbackConfig {
    FeedbackConfig {
        rounds,
        episodes_per_round: 20,
        trajectories_per_round: 6,
        max_pairs: 4,
        strength: 1.0,
        explore: true,
    }
}

#[test]
fn test_feedback_rounds_apply_judgments() {
    let mut engine = chain_engine(5, 11);
    let mut env = ChainWalk::new(5);
    let mut judge = HeuristicJudge::default();

    let rounds = engine
        .train_with_feedback(&mut env, &mut judge, &feedback(3))
        .unwrap();

    assert_eq!(rounds.len(), 3);
    assert_eq!(engine.metrics().len(), 60);
    assert_eq!(engine.phase(), TrainingPhase::RolloutTraining);

    let mut applied = 0;
    for (i, round) in rounds.iter().enumerate() {
        assert_eq!(round.round, i + 1);
        assert_eq!(round.episodes, 20);
        assert_eq!(round.trajectories, 6);
        assert!(round.pairs <= 4);
        assert_eq!(round.applied + round.ties, round.pairs);
        applied += round.applied;
        assert_eq!(round.preference_updates, applied);
    }
    assert_eq!(engine.stats().preference_updates, applied);

    let outcome = engine.finish().unwrap();
    assert_eq!(outcome.snapshot.training_rewards.len(), 60);
}

#[test]
fn test_feedback_ties_only_train() {
    let mut engine = chain_engine(5, 4);
    let mut env = ChainWalk::new(5);
    let mut judge = Undecided::default();

    let rounds = engine
        .train_with_feedback(&mut env, &mut judge, &feedback(2))
        .unwrap();

    let pairs: usize = rounds.iter().map(|r| r.pairs).sum();
    assert_eq!(judge.asked, pairs);
    assert!(rounds.iter().all(|r| r.applied == 0 && r.ties == r.pairs));
    assert_eq!(engine.stats().preference_updates, 0);
    assert!(engine.preference_summary().is_none());
    // rollouts alone account for every table update
    let steps = engine.metrics().total_steps() as u64;
    assert_eq!(engine.store().update_count(), steps);
}

#[test]
fn test_feedback_rejects_invalid_config() {
    let mut engine = chain_engine(5, 1);
    let config = FeedbackConfig {
        trajectories_per_round: 1,
        ..feedback(1)
    };

    let err = engine
        .train_with_feedback(&mut ChainWalk::new(5), &mut Undecided::default(), &config)
        .unwrap_err();

    assert!(matches!(err, PbrlError::Config(_)));
    assert_eq!(engine.phase(), TrainingPhase::Init);
    assert!(engine.metrics().is_empty());
}
