//! Real-valued nonlinear rank solver.
//!
//! Runs the momentum fixed-point search directly on the `f32` adjacency
//! weights.

use tracing::instrument;

use crate::config::FixedPointParams;
use crate::error::SolverError;
use crate::fixed_point::search;
use crate::matrix::AdjacencyMatrix;
use crate::traits::NonlinearRankSolver;
use crate::types::{Algorithm, FixedPointSolution, GradientNorm};

/// Fixed-point ranking over real scores.
#[derive(Debug, Clone, Default)]
pub struct RealRankSolver {
    params: FixedPointParams,
}

impl RealRankSolver {
    /// Create a solver with the given search parameters.
    pub fn new(params: FixedPointParams) -> Self {
        Self { params }
    }

    /// Search parameters.
    pub fn params(&self) -> &FixedPointParams {
        &self.params
    }
}

impl NonlinearRankSolver for RealRankSolver {
    type Scalar = f32;

    #[instrument(skip(self, matrix), fields(n = matrix.size()))]
    fn solve(&self, matrix: &AdjacencyMatrix) -> Result<FixedPointSolution<f32>, SolverError> {
        search(
            matrix.to_tensor(),
            &self.params,
            GradientNorm::PrincipalRoot,
            Algorithm::RealFixedPoint,
        )
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::RealFixedPoint
    }
}
