//! Uniform grid discretization of continuous observations
//!
//! Each dimension `[min, max]` is split into `bins` equal-width bins by
//! `bins - 1` interior edges. A value is assigned the number of edges that
//! are `<=` it, so anything below `min` lands in bin 0 and anything at or
//! above the last edge (including values past `max`) lands in the last bin.
//! The mapping saturates instead of failing.
//!
//! Per-dimension indices are combined row-major, first dimension most
//! significant. For two dimensions this is
//! `id = first_index * second_bins + second_index`; persisted tables depend
//! on that exact layout.

use std::fmt;

use serde::Serialize;

use pbrl_core::{PbrlError, Result, StateId};

use crate::config::{DimensionConfig, DiscretizationConfig};

/// One axis of the grid with its precomputed interior edges
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    name: String,
    min: f64,
    max: f64,
    bins: usize,
    edges: Vec<f64>,
}

impl Dimension {
    pub fn new(config: &DimensionConfig) -> Result<Self> {
        if config.bins < 2 {
            return Err(PbrlError::Config(format!(
                "dimension '{}' needs at least 2 bins, got {}",
                config.name, config.bins
            )));
        }
        if !(config.min.is_finite() && config.max.is_finite() && config.min < config.max) {
            return Err(PbrlError::Config(format!(
                "dimension '{}' has invalid bounds [{}, {}]",
                config.name, config.min, config.max
            )));
        }

        let width = config.max - config.min;
        let edges = (1..config.bins)
            .map(|k| config.min + width * k as f64 / config.bins as f64)
            .collect();

        Ok(Self {
            name: config.name.clone(),
            min: config.min,
            max: config.max,
            bins: config.bins,
            edges,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin index in `[0, bins)`. NaN falls into bin 0.
    pub fn bin_index(&self, value: f64) -> usize {
        self.edges.partition_point(|&edge| edge <= value)
    }

    /// Representative value of a bin: its center, or the bound for the
    /// two extreme bins.
    pub fn bin_value(&self, index: usize) -> f64 {
        if index == 0 {
            self.min
        } else if index >= self.edges.len() {
            self.max
        } else {
            (self.edges[index - 1] + self.edges[index]) / 2.0
        }
    }

    /// Width of one bin
    pub fn resolution(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    fn config(&self) -> DimensionConfig {
        DimensionConfig::new(self.name.clone(), self.bins, self.min, self.max)
    }
}

/// Maps continuous observations onto `[0, n_states)`
#[derive(Debug, Clone, PartialEq)]
pub struct GridDiscretizer {
    dimensions: Vec<Dimension>,
    strides: Vec<usize>,
    n_states: usize,
}

impl GridDiscretizer {
    pub fn new(config: &DiscretizationConfig) -> Result<Self> {
        if config.dimensions.is_empty() {
            return Err(PbrlError::Config(
                "discretization needs at least one dimension".to_string(),
            ));
        }

        let dimensions = config
            .dimensions
            .iter()
            .map(Dimension::new)
            .collect::<Result<Vec<_>>>()?;

        let mut strides = vec![1usize; dimensions.len()];
        for i in (0..dimensions.len() - 1).rev() {
            strides[i] = strides[i + 1] * dimensions[i + 1].bins;
        }

        let n_states = dimensions
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d.bins))
            .ok_or_else(|| PbrlError::Config("discretization grid is too large".to_string()))?;

        Ok(Self {
            dimensions,
            strides,
            n_states,
        })
    }

    /// Standard position/velocity grid for the continuous task
    pub fn mountain_car(position_bins: usize, velocity_bins: usize) -> Result<Self> {
        Self::new(&DiscretizationConfig::mountain_car(position_bins, velocity_bins))
    }

    /// Product of per-dimension bin counts
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn config(&self) -> DiscretizationConfig {
        DiscretizationConfig {
            dimensions: self.dimensions.iter().map(Dimension::config).collect(),
        }
    }

    fn check_arity(&self, observation: &[f64]) -> Result<()> {
        if observation.len() == self.dimensions.len() {
            Ok(())
        } else {
            Err(PbrlError::Config(format!(
                "observation has {} values, discretizer expects {}",
                observation.len(),
                self.dimensions.len()
            )))
        }
    }

    /// Per-dimension bin indices of an observation
    pub fn bin_indices(&self, observation: &[f64]) -> Result<Vec<usize>> {
        self.check_arity(observation)?;
        Ok(self
            .dimensions
            .iter()
            .zip(observation)
            .map(|(dim, &value)| dim.bin_index(value))
            .collect())
    }

    /// Discrete state id of an observation
    pub fn discretize(&self, observation: &[f64]) -> Result<StateId> {
        let indices = self.bin_indices(observation)?;
        Ok(indices
            .iter()
            .zip(&self.strides)
            .map(|(index, stride)| index * stride)
            .sum())
    }

    /// Representative observation of a state id. Lossy: only
    /// `discretize(discrete_to_continuous(id)) == id` is guaranteed.
    pub fn discrete_to_continuous(&self, state: StateId) -> Result<Vec<f64>> {
        if state >= self.n_states {
            return Err(PbrlError::Config(format!(
                "state {state} outside [0, {})",
                self.n_states
            )));
        }

        Ok(self
            .dimensions
            .iter()
            .zip(&self.strides)
            .map(|(dim, stride)| dim.bin_value((state / stride) % dim.bins))
            .collect())
    }

    /// Diagnostic view of an observation
    pub fn state_info(&self, observation: &[f64]) -> Result<StateInfo> {
        let bins = self.bin_indices(observation)?;
        let state = self.discretize(observation)?;
        let first = &self.dimensions[0];
        let progress_percent = (observation[0] - first.min) / (first.max - first.min) * 100.0;

        Ok(StateInfo {
            observation: observation.to_vec(),
            state,
            bins,
            progress_percent,
        })
    }

    pub fn statistics(&self) -> DiscretizationStats {
        DiscretizationStats {
            n_states: self.n_states,
            dimensions: self
                .dimensions
                .iter()
                .map(|d| DimensionStats {
                    name: d.name.clone(),
                    bins: d.bins,
                    resolution: d.resolution(),
                    range: (d.min, d.max),
                })
                .collect(),
        }
    }
}

impl fmt::Display for GridDiscretizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "DISCRETIZATION GRID")?;
        writeln!(f, "{}", "=".repeat(60))?;
        for d in &self.dimensions {
            writeln!(
                f,
                "{:<10} [{:.3}, {:.3}] -> {} bins (width {:.4})",
                d.name,
                d.min,
                d.max,
                d.bins,
                d.resolution()
            )?;
        }
        writeln!(f, "Total states: {}", self.n_states)?;
        write!(f, "{}", "=".repeat(60))
    }
}

/// Where an observation falls in the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateInfo {
    pub observation: Vec<f64>,
    pub state: StateId,
    pub bins: Vec<usize>,
    /// Position of the first coordinate within its bounds, in percent
    pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionStats {
    pub name: String,
    pub bins: usize,
    pub resolution: f64,
    pub range: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscretizationStats {
    pub n_states: usize,
    pub dimensions: Vec<DimensionStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridDiscretizer {
        GridDiscretizer::mountain_car(20, 20).unwrap()
    }

    #[test]
    fn test_n_states_is_product_of_bins() {
        assert_eq!(grid().n_states(), 400);
        assert_eq!(GridDiscretizer::mountain_car(10, 30).unwrap().n_states(), 300);
    }

    #[test]
    fn test_row_major_combination() {
        let d = grid();
        let obs = [0.05, 0.021];
        let bins = d.bin_indices(&obs).unwrap();
        assert_eq!(d.discretize(&obs).unwrap(), bins[0] * 20 + bins[1]);
    }

    #[test]
    fn test_saturates_outside_bounds() {
        let d = grid();
        assert_eq!(d.discretize(&[-5.0, -1.0]).unwrap(), 0);
        assert_eq!(d.discretize(&[5.0, 1.0]).unwrap(), 399);
        assert_eq!(d.bin_indices(&[-1.2, 0.07]).unwrap(), vec![0, 19]);
        assert_eq!(d.bin_indices(&[0.6, -0.07]).unwrap(), vec![19, 0]);
    }

    #[test]
    fn test_nan_falls_into_first_bin() {
        let d = grid();
        assert_eq!(d.bin_indices(&[f64::NAN, 0.07]).unwrap(), vec![0, 19]);
    }

    #[test]
    fn test_bin_boundaries() {
        let dim = Dimension::new(&DimensionConfig::new("x", 4, 0.0, 1.0)).unwrap();
        assert_eq!(dim.edges(), &[0.25, 0.5, 0.75]);
        assert_eq!(dim.bin_index(0.0), 0);
        assert_eq!(dim.bin_index(0.2499), 0);
        assert_eq!(dim.bin_index(0.25), 1);
        assert_eq!(dim.bin_index(0.74), 2);
        assert_eq!(dim.bin_index(1.0), 3);
        assert_eq!(dim.bin_value(0), 0.0);
        assert_eq!(dim.bin_value(1), 0.375);
        assert_eq!(dim.bin_value(3), 1.0);
    }

    #[test]
    fn test_inverse_maps_back_to_same_id() {
        for (pos_bins, vel_bins) in [(20, 20), (2, 7), (13, 3)] {
            let d = GridDiscretizer::mountain_car(pos_bins, vel_bins).unwrap();
            for id in 0..d.n_states() {
                let center = d.discrete_to_continuous(id).unwrap();
                assert_eq!(d.discretize(&center).unwrap(), id, "grid {pos_bins}x{vel_bins}");
            }
        }
    }

    #[test]
    fn test_inverse_rejects_out_of_range() {
        assert!(grid().discrete_to_continuous(400).is_err());
    }

    #[test]
    fn test_arity_mismatch_is_config_error() {
        assert!(matches!(grid().discretize(&[0.0]), Err(PbrlError::Config(_))));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(GridDiscretizer::mountain_car(1, 20).is_err());
        assert!(GridDiscretizer::new(&DiscretizationConfig { dimensions: vec![] }).is_err());
        let inverted = DiscretizationConfig {
            dimensions: vec![DimensionConfig::new("x", 5, 1.0, -1.0)],
        };
        assert!(GridDiscretizer::new(&inverted).is_err());
    }

    #[test]
    fn test_three_dimensional_grid() {
        let config = DiscretizationConfig {
            dimensions: vec![
                DimensionConfig::new("a", 3, 0.0, 3.0),
                DimensionConfig::new("b", 4, 0.0, 4.0),
                DimensionConfig::new("c", 5, 0.0, 5.0),
            ],
        };
        let d = GridDiscretizer::new(&config).unwrap();
        assert_eq!(d.n_states(), 60);
        assert_eq!(d.discretize(&[2.5, 1.5, 4.5]).unwrap(), 2 * 20 + 5 + 4);
    }

    #[test]
    fn test_state_info_and_statistics() {
        let d = grid();
        let info = d.state_info(&[-0.3, 0.0]).unwrap();
        assert!((info.progress_percent - 50.0).abs() < 1e-9);
        assert_eq!(info.state, d.discretize(&[-0.3, 0.0]).unwrap());

        let stats = d.statistics();
        assert_eq!(stats.n_states, 400);
        assert!((stats.dimensions[0].resolution - 0.09).abs() < 1e-12);
        assert_eq!(d.config(), DiscretizationConfig::mountain_car(20, 20));
        assert!(d.to_string().contains("Total states: 400"));
    }
}
