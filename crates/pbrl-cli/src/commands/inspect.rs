//! Inspection of discretization grids, snapshots and trajectory files

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use pbrl_rl::persistence::load_trajectories;
use pbrl_rl::{GridDiscretizer, HeuristicJudge, ValueSnapshot};

use super::blocking;
use crate::config::PbrlConfig;

#[derive(Subcommand)]
pub enum InspectCommands {
    /// Show the continuous-task discretization grid
    Grid,
    /// Locate an observation in the grid
    State {
        /// Observation values, one per grid dimension
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Summarize a value snapshot
    Snapshot {
        path: PathBuf,
        /// Episodes averaged for the recent reward line
        #[arg(long, default_value_t = 100)]
        window: usize,
    },
    /// Summarize a trajectory collection
    Trajectories { path: PathBuf },
}

pub async fn run(cmd: InspectCommands, config_path: Option<&Path>) -> Result<()> {
    let config = PbrlConfig::load(config_path)?;
    match cmd {
        InspectCommands::Grid => grid(&config),
        InspectCommands::State { values } => state(&config, &values),
        InspectCommands::Snapshot { path, window } => snapshot(path, window).await,
        InspectCommands::Trajectories { path } => trajectories(&config, &path).await,
    }
}

fn configured_grid(config: &PbrlConfig) -> Result<GridDiscretizer> {
    let layout = config.mountain_car.discretization.clone().unwrap_or_default();
    Ok(GridDiscretizer::new(&layout)?)
}

fn grid(config: &PbrlConfig) -> Result<()> {
    let grid = configured_grid(config)?;
    println!("{grid}\n");
    for dim in grid.dimensions() {
        let (min, max) = dim.bounds();
        println!("{} edges ({:.4} .. {:.4}):", dim.name(), min, max);
        let edges: Vec<String> = dim.edges().iter().map(|e| format!("{e:.4}")).collect();
        println!("  {}", edges.join(", "));
    }
    Ok(())
}

fn state(config: &PbrlConfig, values: &[f64]) -> Result<()> {
    let grid = configured_grid(config)?;
    let info = grid.state_info(values)?;
    let center = grid.discrete_to_continuous(info.state)?;

    println!("Observation:  {:?}", info.observation);
    println!("State:        {}", info.state);
    println!("Bins:         {:?}", info.bins);
    println!("Bin center:   {center:?}");
    println!("Progress:     {:.1}%", info.progress_percent);
    Ok(())
}

async fn snapshot(path: PathBuf, window: usize) -> Result<()> {
    let snapshot = blocking(format!("Failed to load {}", path.display()), {
        let path = path.clone();
        move || ValueSnapshot::load(path)
    })
    .await?;

    let (n_states, n_actions) = snapshot.shape();
    let hp = &snapshot.hyperparameters;

    println!("Value Snapshot");
    println!("==============\n");
    println!("File:          {}", path.display());
    println!("Run:           {}", snapshot.run_id);
    println!("Saved at:      {}", snapshot.saved_at);
    println!("Shape:         {n_states} states x {n_actions} actions");
    println!(
        "Learning:      alpha {} gamma {} epsilon {:.4} (decay {}, floor {})",
        hp.learning_rate, hp.discount_factor, snapshot.epsilon, hp.epsilon_decay, hp.epsilon_min
    );
    println!("Pref. weight:  {}", snapshot.preference_weight);

    if let Some(layout) = &snapshot.discretization {
        println!("Grid bins:     {:?}", layout.bin_counts());
    }

    if let Some(summary) = &snapshot.preference_summary {
        println!(
            "Preferences:   {} updates, mean strength {:.3}",
            summary.total_updates, summary.avg_strength
        );
    }

    let rewards = &snapshot.training_rewards;
    if !rewards.is_empty() {
        let recent = &rewards[rewards.len().saturating_sub(window.max(1))..];
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        println!(
            "Training:      {} episodes, mean reward over last {} = {mean:.2}",
            rewards.len(),
            recent.len()
        );
    }

    let store = snapshot.to_store()?;
    let mut greedy_counts = vec![0usize; n_actions];
    let mut untouched = 0;
    for state in 0..n_states {
        if store.q_values(state)?.iter().all(|&v| v == 0.0) {
            untouched += 1;
        }
        greedy_counts[store.greedy_action(state)?] += 1;
    }

    println!("\nGreedy policy:");
    for (action, count) in greedy_counts.iter().enumerate() {
        println!(
            "  action {action}: {count} states ({:.1}%)",
            *count as f64 / n_states as f64 * 100.0
        );
    }
    println!("Untouched states: {untouched}");

    let table = store.table();
    let min = table.iter().copied().fold(f64::INFINITY, f64::min);
    let max = table.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("Value range:      [{min:.3}, {max:.3}]");

    Ok(())
}

async fn trajectories(config: &PbrlConfig, path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    let trajectories = blocking(
        format!("Failed to load {}", path.display()),
        move || load_trajectories(owned),
    )
    .await?;
    let judge = HeuristicJudge::new(config.judge.clone());

    println!("Trajectories: {}\n", trajectories.len());
    println!(
        "{:>6} {:>8} {:>10} {:>10} {:>10}  success",
        "id", "length", "reward", "efficiency", "max obs"
    );
    for t in &trajectories {
        let max_obs = t
            .max_observation(config.judge.progress_dim)
            .map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
        println!(
            "{:>6} {:>8} {:>10.2} {:>10.3} {:>10}  {}",
            t.episode_id(),
            t.len(),
            t.total_reward(),
            t.efficiency(),
            max_obs,
            if judge.is_success(t) { "yes" } else { "no" }
        );
    }
    Ok(())
}
