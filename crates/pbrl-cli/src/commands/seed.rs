//! Preference seeding of value tables

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use pbrl_core::{PreferenceRecord, Trajectory};
use pbrl_rl::persistence::{load_preferences, load_trajectories};
use pbrl_rl::{
    AgentConfig, GridDiscretizer, IdentityMapper, StateMapper, TrainingEngine, TrainingOutcome,
    ValueSnapshot,
};

use super::blocking;
use crate::config::{PbrlConfig, TaskKind};

#[derive(Args)]
pub struct SeedArgs {
    /// Task the table belongs to
    #[arg(short, long, value_enum, default_value = "taxi")]
    pub task: TaskKind,

    /// Trajectory collection (JSON)
    #[arg(long)]
    pub trajectories: PathBuf,

    /// Preference records (JSON)
    #[arg(long)]
    pub preferences: PathBuf,

    /// Snapshot to resume from instead of a zero table
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Where to write the seeded snapshot
    #[arg(short, long)]
    pub output: PathBuf,

    /// Seed for the exploration RNG
    #[arg(long)]
    pub seed: Option<u64>,
}

pub async fn run(args: SeedArgs, config_path: Option<&Path>) -> Result<()> {
    let config = PbrlConfig::load(config_path)?;
    let mut agent = config.agent(args.task).clone();
    if let Some(seed) = args.seed {
        agent = agent.with_seed(seed);
    }

    let path = args.trajectories.clone();
    let trajectories = blocking(
        format!("Failed to load {}", path.display()),
        move || load_trajectories(path),
    )
    .await?;
    let path = args.preferences.clone();
    let records = blocking(
        format!("Failed to load {}", path.display()),
        move || load_preferences(path),
    )
    .await?;
    info!(
        trajectories = trajectories.len(),
        preferences = records.len(),
        "Loaded preference data"
    );

    let task = args.task;
    let n_states = config.discrete.n_states;
    let from = args.from.clone();

    let outcome = tokio::task::spawn_blocking(move || -> Result<TrainingOutcome> {
        match task {
            TaskKind::Taxi => {
                let mapper = IdentityMapper::new(n_states)?;
                seed_with(agent, mapper, from, &records, &trajectories)
            }
            TaskKind::MountainCar => {
                let layout = agent.discretization.clone().unwrap_or_default();
                let grid = GridDiscretizer::new(&layout)?;
                seed_with(agent, grid, from, &records, &trajectories)
            }
        }
    })
    .await
    .context("Seeding task panicked")??;

    print_outcome(&outcome);
    let output = args.output.clone();
    let snapshot = outcome.snapshot;
    blocking(
        format!("Failed to write {}", output.display()),
        move || snapshot.save(output),
    )
    .await?;
    println!("\nSnapshot written to {}", args.output.display());

    Ok(())
}

fn seed_with<M: StateMapper>(
    agent: AgentConfig,
    mapper: M,
    from: Option<PathBuf>,
    records: &[PreferenceRecord],
    trajectories: &[Trajectory],
) -> Result<TrainingOutcome> {
    let mut engine = match from {
        Some(path) => {
            let snapshot = ValueSnapshot::load(&path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            TrainingEngine::from_snapshot(agent, mapper, snapshot)?
        }
        None => TrainingEngine::new(agent, mapper)?,
    };

    engine.seed_preferences(records, trajectories)?;
    Ok(engine.finish()?)
}

fn print_outcome(outcome: &TrainingOutcome) {
    println!("Preference Seeding");
    println!("==================\n");
    println!("Run:            {}", outcome.run_id);

    if let Some(report) = &outcome.seeding {
        println!("Records:        {}", report.total_records);
        println!("Applied:        {}", report.applied);
        println!("Ties:           {}", report.ties);
        println!("Updated steps:  {}", report.updated_steps);
        if report.skipped() > 0 {
            println!(
                "Skipped:        {} (unknown trajectory: {}, unusable strength: {})",
                report.skipped(),
                report.skipped_missing,
                report.skipped_invalid_strength
            );
            if !report.missing_ids.is_empty() {
                println!("Missing ids:    {:?}", report.missing_ids);
            }
        }
        if report.skipped_steps > 0 {
            println!("Unmapped steps: {}", report.skipped_steps);
        }
    }

    if let Some(summary) = &outcome.preference_summary {
        println!("\nAverage strength: {:.3}", summary.avg_strength);
        println!("Average bonus:    {:+.3}", summary.avg_bonus);
        println!("Average penalty:  {:+.3}", summary.avg_penalty);
        println!("Weight:           {}", summary.preference_weight);
    }
}
