//! JSON persistence for value snapshots, trajectory sets and preference files

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pbrl_core::{PbrlError, PreferenceRecord, Result, RunId, Trajectory};

use crate::config::{DiscretizationConfig, HyperParameters};
use crate::credit::PreferenceSummary;
use crate::value_store::ValueStore;

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Value table plus everything needed to resume or inspect it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub version: u32,
    pub run_id: RunId,
    pub saved_at: DateTime<Utc>,
    pub hyperparameters: HyperParameters,
    /// Exploration rate reached when the snapshot was taken
    pub epsilon: f64,
    pub preference_weight: f64,
    #[serde(default)]
    pub discretization: Option<DiscretizationConfig>,
    #[serde(default)]
    pub preference_summary: Option<PreferenceSummary>,
    #[serde(default)]
    pub training_rewards: Vec<f64>,
    pub q_table: Array2<f64>,
}

impl ValueSnapshot {
    pub fn capture(
        run_id: RunId,
        store: &ValueStore,
        preference_weight: f64,
        discretization: Option<DiscretizationConfig>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            run_id,
            saved_at: Utc::now(),
            hyperparameters: store.hyperparameters().clone(),
            epsilon: store.epsilon(),
            preference_weight,
            discretization,
            preference_summary: None,
            training_rewards: Vec::new(),
            q_table: store.table().clone(),
        }
    }

    pub fn with_preference_summary(mut self, summary: Option<PreferenceSummary>) -> Self {
        self.preference_summary = summary;
        self
    }

    pub fn with_training_rewards(mut self, rewards: Vec<f64>) -> Self {
        self.training_rewards = rewards;
        self
    }

    /// `(n_states, n_actions)`
    pub fn shape(&self) -> (usize, usize) {
        self.q_table.dim()
    }

    pub fn check_shape(&self, expected: (usize, usize)) -> Result<()> {
        let found = self.shape();
        if found == expected {
            Ok(())
        } else {
            Err(PbrlError::ShapeMismatch { expected, found })
        }
    }

    /// Rebuild a value store that resumes at the recorded epsilon
    pub fn to_store(&self) -> Result<ValueStore> {
        Ok(ValueStore::from_table(self.q_table.clone(), self.hyperparameters.clone())?
            .with_epsilon(self.epsilon))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path.as_ref(), self)?;
        debug!(path = %path.as_ref().display(), shape = ?self.shape(), "Saved value snapshot");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot: Self = read_json(path.as_ref())?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PbrlError::DataIntegrity(format!(
                "snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Load and require a `(n_states, n_actions)` table
    pub fn load_expecting(path: impl AsRef<Path>, expected: (usize, usize)) -> Result<Self> {
        let snapshot = Self::load(path)?;
        snapshot.check_shape(expected)?;
        Ok(snapshot)
    }
}

/// Read a trajectory collection; aggregates are checked against the steps
pub fn load_trajectories(path: impl AsRef<Path>) -> Result<Vec<Trajectory>> {
    read_json(path.as_ref())
}

pub fn save_trajectories(path: impl AsRef<Path>, trajectories: &[Trajectory]) -> Result<()> {
    write_json(path.as_ref(), trajectories)
}

/// Read a preference collection, in file order
pub fn load_preferences(path: impl AsRef<Path>) -> Result<Vec<PreferenceRecord>> {
    read_json(path.as_ref())
}

pub fn save_preferences(path: impl AsRef<Path>, records: &[PreferenceRecord]) -> Result<()> {
    write_json(path.as_ref(), records)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbrl_core::{PreferenceChoice, TrajectoryStep};

    fn snapshot() -> ValueSnapshot {
        let mut store = ValueStore::new(4, 2, HyperParameters::taxi()).unwrap();
        store.set_value(3, 1, 2.5).unwrap();
        store.decay_epsilon();
        ValueSnapshot::capture(RunId::new(), &store, 0.5, None)
            .with_training_rewards(vec![1.0, -2.0])
    }

    #[test]
    fn test_snapshot_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.json");
        let original = snapshot();

        original.save(&path).unwrap();
        let loaded = ValueSnapshot::load_expecting(&path, (4, 2)).unwrap();

        assert_eq!(loaded, original);
        let store = loaded.to_store().unwrap();
        assert_eq!(store.value(3, 1).unwrap(), 2.5);
        assert_eq!(store.epsilon(), 0.995);
    }

    #[test]
    fn test_snapshot_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");
        snapshot().save(&path).unwrap();

        let err = ValueSnapshot::load_expecting(&path, (400, 3)).unwrap_err();
        assert!(matches!(
            err,
            PbrlError::ShapeMismatch {
                expected: (400, 3),
                found: (4, 2)
            }
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_preferences(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PbrlError::Io(_)));
    }

    #[test]
    fn test_trajectory_and_preference_files() {
        let dir = tempfile::tempdir().unwrap();
        let trajectories = vec![
            Trajectory::new(1, vec![TrajectoryStep::discrete(0, 1, 20.0, 1, true, 0)]),
            Trajectory::new(2, vec![TrajectoryStep::discrete(0, 2, -10.0, 0, false, 0)]),
        ];
        let records = vec![PreferenceRecord::from_pair(
            &trajectories[0],
            &trajectories[1],
            PreferenceChoice::PreferFirst,
        )];

        save_trajectories(dir.path().join("t.json"), &trajectories).unwrap();
        save_preferences(dir.path().join("p.json"), &records).unwrap();

        assert_eq!(load_trajectories(dir.path().join("t.json")).unwrap(), trajectories);
        assert_eq!(load_preferences(dir.path().join("p.json")).unwrap(), records);
    }

    #[test]
    fn test_tampered_trajectory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let json = r#"[{"episode_id": 1, "steps": [], "total_reward": 5.0, "episode_length": 0}]"#;
        fs::write(&path, json).unwrap();

        assert!(load_trajectories(&path).is_err());
    }
}
