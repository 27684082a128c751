//! Core result and identifier types shared by the solver family.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

/// Identifies which member of the solver family produced a result or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Real-valued two-layer softmax fixed-point search.
    RealFixedPoint,
    /// Complex-valued fixed-point search over the Hermitian-style embedding.
    ComplexFixedPoint,
    /// Self-consistency training of the matrix toward `A·Aᵀ ≈ I`.
    SelfConsistency,
    /// Power-iteration PageRank (the linear baseline).
    PageRank,
}

impl Algorithm {
    /// Configuration section holding this algorithm's parameters, used to
    /// qualify parameter names in validation errors.
    pub fn config_section(&self) -> &'static str {
        match self {
            Algorithm::RealFixedPoint | Algorithm::ComplexFixedPoint => "solver",
            Algorithm::SelfConsistency => "self_consistency",
            Algorithm::PageRank => "pagerank",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::RealFixedPoint => write!(f, "real-fixed-point"),
            Algorithm::ComplexFixedPoint => write!(f, "complex-fixed-point"),
            Algorithm::SelfConsistency => write!(f, "self-consistency"),
            Algorithm::PageRank => write!(f, "pagerank"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gradient norm policy
// ---------------------------------------------------------------------------

/// How the gradient norm used for clipping is computed.
///
/// For real scalars both policies coincide. For complex scalars
/// [`GradientNorm::PrincipalRoot`] takes the principal square root of
/// `Σ d²` (a complex number whose magnitude decides clipping), while
/// [`GradientNorm::Magnitude`] uses the true vector magnitude `sqrt(Σ |d|²)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientNorm {
    /// `sqrt(Σ d_i²)` evaluated in the scalar field.
    #[default]
    PrincipalRoot,
    /// `sqrt(Σ |d_i|²)` as a real number.
    Magnitude,
}

// ---------------------------------------------------------------------------
// Convergence tracking
// ---------------------------------------------------------------------------

/// Per-iteration convergence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    /// Iteration index (0-based).
    pub iteration: usize,
    /// Loss magnitude evaluated at the start of this iteration.
    pub loss: f64,
    /// Magnitude of the gradient norm before clipping.
    pub gradient_norm: f64,
}

/// Result of one nonlinear fixed-point search.
///
/// Carries every intermediate layer so callers can inspect them directly.
#[derive(Debug, Clone)]
pub struct FixedPointSolution<S> {
    /// The converged (or budget-exhausted) score vector `x`.
    pub scores: Vec<S>,
    /// `layers[0] = softmax(A·x)`, `layers[1] = softmax(A·layers[0])`,
    /// evaluated at the final `x`.
    pub layers: Vec<Vec<S>>,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the loss dropped below the tolerance.
    pub converged: bool,
    /// Loss magnitude of the last evaluated iteration.
    pub final_loss: f64,
    /// Per-iteration convergence history.
    pub convergence_history: Vec<ConvergenceInfo>,
    /// Wall-clock time taken.
    pub wall_time: Duration,
    /// Algorithm that produced the solution.
    pub algorithm: Algorithm,
}

impl<S> FixedPointSolution<S> {
    /// The first intermediate layer, `softmax(A·x)`.
    pub fn middle_layer(&self) -> &[S] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Distances
// ---------------------------------------------------------------------------

/// Edit distances between the baseline ranking and a nonlinear family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistancePair {
    /// Distance to the ranking of the first intermediate layer.
    pub middle: usize,
    /// Distance to the ranking of the converged fixed point.
    pub fixed_point: usize,
}

/// Mean distances produced from a [`TrialAccumulator`](crate::trial::TrialAccumulator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanDistances {
    /// Mean middle-layer distance.
    pub middle: f64,
    /// Mean fixed-point distance.
    pub fixed_point: f64,
}

/// A complex score reported in polar form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarScore {
    /// `|z|`.
    pub magnitude: f64,
    /// `arg(z)` in radians.
    pub phase: f64,
}
