//! Pairwise preference judgments between two recorded trajectories

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::trajectory::Trajectory;
use crate::types::TrajectoryId;

/// Outcome of a pairwise comparison.
///
/// Persisted as the integer codes `0` (tie), `1` (first preferred) and
/// `2` (second preferred).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PreferenceChoice {
    Tie,
    PreferFirst,
    PreferSecond,
}

impl PreferenceChoice {
    pub fn code(self) -> u8 {
        match self {
            PreferenceChoice::Tie => 0,
            PreferenceChoice::PreferFirst => 1,
            PreferenceChoice::PreferSecond => 2,
        }
    }
}

impl TryFrom<u8> for PreferenceChoice {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PreferenceChoice::Tie),
            1 => Ok(PreferenceChoice::PreferFirst),
            2 => Ok(PreferenceChoice::PreferSecond),
            other => Err(format!("invalid preference choice code: {other}")),
        }
    }
}

impl From<PreferenceChoice> for u8 {
    fn from(choice: PreferenceChoice) -> Self {
        choice.code()
    }
}

impl std::fmt::Display for PreferenceChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreferenceChoice::Tie => write!(f, "tie"),
            PreferenceChoice::PreferFirst => write!(f, "first"),
            PreferenceChoice::PreferSecond => write!(f, "second"),
        }
    }
}

/// A judgment between trajectories `a` and `b`.
///
/// The reward/length/efficiency scalars are redundant copies of the
/// trajectories' aggregates, kept for strength derivation and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub trajectory_a_id: TrajectoryId,
    pub trajectory_b_id: TrajectoryId,
    pub choice: PreferenceChoice,

    #[serde(default)]
    pub trajectory_a_reward: f64,
    #[serde(default)]
    pub trajectory_b_reward: f64,
    #[serde(default)]
    pub trajectory_a_length: usize,
    #[serde(default)]
    pub trajectory_b_length: usize,
    #[serde(default)]
    pub trajectory_a_efficiency: f64,
    #[serde(default)]
    pub trajectory_b_efficiency: f64,

    /// RFC 3339 on write; naive ISO 8601 timestamps are read as UTC
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl PreferenceRecord {
    /// Bare record with only ids and choice
    pub fn new(a: TrajectoryId, b: TrajectoryId, choice: PreferenceChoice) -> Self {
        Self {
            trajectory_a_id: a,
            trajectory_b_id: b,
            choice,
            trajectory_a_reward: 0.0,
            trajectory_b_reward: 0.0,
            trajectory_a_length: 0,
            trajectory_b_length: 0,
            trajectory_a_efficiency: 0.0,
            trajectory_b_efficiency: 0.0,
            timestamp: None,
            auto_selected: false,
            reasoning: None,
        }
    }

    /// Record a judgment on a concrete pair, copying its descriptive scalars
    pub fn from_pair(a: &Trajectory, b: &Trajectory, choice: PreferenceChoice) -> Self {
        Self {
            trajectory_a_reward: a.total_reward(),
            trajectory_b_reward: b.total_reward(),
            trajectory_a_length: a.len(),
            trajectory_b_length: b.len(),
            trajectory_a_efficiency: a.efficiency(),
            trajectory_b_efficiency: b.efficiency(),
            timestamp: Some(Utc::now()),
            ..Self::new(a.episode_id(), b.episode_id(), choice)
        }
    }

    pub fn with_auto_selected(mut self, auto_selected: bool) -> Self {
        self.auto_selected = auto_selected;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn is_tie(&self) -> bool {
        self.choice == PreferenceChoice::Tie
    }

    /// `(preferred, less_preferred)` ids, or `None` for a tie
    pub fn ordered_ids(&self) -> Option<(TrajectoryId, TrajectoryId)> {
        match self.choice {
            PreferenceChoice::Tie => None,
            PreferenceChoice::PreferFirst => Some((self.trajectory_a_id, self.trajectory_b_id)),
            PreferenceChoice::PreferSecond => Some((self.trajectory_b_id, self.trajectory_a_id)),
        }
    }

    /// Absolute difference between the recorded efficiencies
    pub fn efficiency_gap(&self) -> f64 {
        (self.trajectory_a_efficiency - self.trajectory_b_efficiency).abs()
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc()))
        .map(Some)
        .map_err(de::Error::custom)
}
