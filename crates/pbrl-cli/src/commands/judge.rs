//! Heuristic labelling of trajectory pairs

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use pbrl_core::PreferenceChoice;
use pbrl_rl::persistence::{load_trajectories, save_preferences};
use pbrl_rl::HeuristicJudge;

use super::blocking;
use crate::config::PbrlConfig;

#[derive(Args)]
pub struct JudgeArgs {
    /// Trajectory collection (JSON)
    #[arg(long)]
    pub trajectories: PathBuf,

    /// Where to write the preference records
    #[arg(short, long)]
    pub output: PathBuf,

    /// Maximum number of pairs to label
    #[arg(short, long, default_value_t = 30)]
    pub pairs: usize,
}

pub async fn run(args: JudgeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = PbrlConfig::load(config_path)?;
    let path = args.trajectories.clone();
    let trajectories = blocking(
        format!("Failed to load {}", path.display()),
        move || load_trajectories(path),
    )
    .await?;

    let judge = HeuristicJudge::new(config.judge);
    let successes = trajectories.iter().filter(|t| judge.is_success(t)).count();
    info!(
        trajectories = trajectories.len(),
        successes,
        "Selecting contrastive pairs"
    );

    let records = judge.label_contrast_pairs(&trajectories, args.pairs);
    if records.is_empty() {
        warn!("Not enough trajectories to form pairs");
    }

    let count = |choice| records.iter().filter(|r| r.choice == choice).count();
    println!("Auto-labelled Preferences");
    println!("=========================\n");
    println!("Trajectories:   {} ({successes} successful)", trajectories.len());
    println!("Pairs:          {}", records.len());
    println!("Prefer first:   {}", count(PreferenceChoice::PreferFirst));
    println!("Prefer second:  {}", count(PreferenceChoice::PreferSecond));
    println!("Tie:            {}", count(PreferenceChoice::Tie));

    let output = args.output.clone();
    blocking(
        format!("Failed to write {}", output.display()),
        move || save_preferences(output, &records),
    )
    .await?;
    println!("\nPreferences written to {}", args.output.display());

    Ok(())
}
