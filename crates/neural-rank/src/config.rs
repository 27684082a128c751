//! Experiment configuration.
//!
//! Every knob the experiment exposes lives in [`ExperimentConfig`] and is
//! passed explicitly into the [`TrialDriver`](crate::trial::TrialDriver).
//! Missing JSON fields fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::matrix::DEFAULT_SIZE;
use crate::types::GradientNorm;
use crate::validation::validate_config;

/// Default fixed-point iteration budget.
pub const DEFAULT_ITERATIONS: usize = 8;

/// Default iteration budget for self-consistency training.
pub const DEFAULT_TRAINING_ITERATIONS: usize = 128;

/// Default Monte Carlo trial count.
pub const DEFAULT_TRIALS: usize = 1024;

// ---------------------------------------------------------------------------
// Solver parameters
// ---------------------------------------------------------------------------

/// Parameters of a momentum fixed-point search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointParams {
    /// Iteration budget.
    pub iterations: usize,
    /// Step size `η`.
    pub learning_rate: f64,
    /// Momentum coefficient `α`.
    pub momentum: f64,
    /// Stop once the loss magnitude drops below this.
    pub tolerance: f64,
    /// Gradient norm used for clipping in the complex solver.
    pub complex_norm: GradientNorm,
}

impl Default for FixedPointParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            learning_rate: 0.3,
            momentum: 0.3,
            tolerance: 1e-6,
            complex_norm: GradientNorm::default(),
        }
    }
}

impl FixedPointParams {
    /// Defaults for self-consistency training (longer budget).
    pub fn self_consistency() -> Self {
        Self {
            iterations: DEFAULT_TRAINING_ITERATIONS,
            ..Self::default()
        }
    }
}

/// Parameters of the PageRank baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankParams {
    /// Probability of following an edge rather than teleporting.
    pub damping: f64,
    /// L1 change between sweeps below which iteration stops.
    pub tolerance: f64,
    /// Hard cap on sweeps.
    pub max_iterations: usize,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Which experiment the driver runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Deterministic comparison followed by the Monte Carlo campaign.
    #[default]
    Experiment,
    /// Self-consistency training followed by a comparison on the trained matrix.
    Truth,
}

/// Full experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment to run.
    pub mode: Mode,
    /// Seed of the campaign RNG.
    pub seed: u64,
    /// Number of Monte Carlo trials.
    pub trials: usize,
    /// Matrix dimension N.
    pub size: usize,
    /// Parameters of the real and complex rank solvers.
    pub solver: FixedPointParams,
    /// Parameters of self-consistency training.
    pub self_consistency: FixedPointParams,
    /// Parameters of the PageRank baseline.
    pub pagerank: PageRankParams,
    /// Evaluate trials on the rayon pool.
    pub parallel: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            seed: 1,
            trials: DEFAULT_TRIALS,
            size: DEFAULT_SIZE,
            solver: FixedPointParams::default(),
            self_consistency: FixedPointParams::self_consistency(),
            pagerank: PageRankParams::default(),
            parallel: false,
        }
    }
}

impl ExperimentConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`SolverError::Config`] on malformed JSON, [`SolverError::InvalidInput`]
    /// when a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SolverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    ///
    /// [`SolverError::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SolverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`SolverError::Config`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SolverError::Config(e.to_string()))
    }

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        validate_config(self)?;
        Ok(())
    }
}
