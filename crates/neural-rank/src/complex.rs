//! Complex-valued nonlinear rank solver.
//!
//! The adjacency matrix is folded into a Hermitian-style complex matrix
//! (symmetric part real, antisymmetric part imaginary) and the same
//! fixed-point search runs in `Complex<f64>` arithmetic. Rankings of complex
//! scores order by magnitude.

use num_complex::Complex64;
use tracing::instrument;

use crate::config::FixedPointParams;
use crate::error::SolverError;
use crate::fixed_point::search;
use crate::matrix::AdjacencyMatrix;
use crate::traits::NonlinearRankSolver;
use crate::types::{Algorithm, FixedPointSolution, PolarScore};

/// Fixed-point ranking over complex scores.
#[derive(Debug, Clone, Default)]
pub struct ComplexRankSolver {
    params: FixedPointParams,
}

impl ComplexRankSolver {
    /// Create a solver. `params.complex_norm` selects the clipping norm.
    pub fn new(params: FixedPointParams) -> Self {
        Self { params }
    }

    /// Search parameters.
    pub fn params(&self) -> &FixedPointParams {
        &self.params
    }
}

impl NonlinearRankSolver for ComplexRankSolver {
    type Scalar = Complex64;

    #[instrument(skip(self, matrix), fields(n = matrix.size(), norm = ?self.params.complex_norm))]
    fn solve(
        &self,
        matrix: &AdjacencyMatrix,
    ) -> Result<FixedPointSolution<Complex64>, SolverError> {
        search(
            matrix.complex_embedding(),
            &self.params,
            self.params.complex_norm,
            Algorithm::ComplexFixedPoint,
        )
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::ComplexFixedPoint
    }
}

/// Convert complex scores to `(magnitude, phase)` pairs.
pub fn polar_scores(scores: &[Complex64]) -> Vec<PolarScore> {
    scores
        .iter()
        .map(|z| {
            let (magnitude, phase) = z.to_polar();
            PolarScore { magnitude, phase }
        })
        .collect()
}
