//! Solver trait hierarchy.
//!
//! Nonlinear solvers implement [`NonlinearRankSolver`] and return every
//! intermediate layer alongside the fixed point. The linear baseline
//! implements [`LinearRankSolver`]. The trial driver only talks to solvers
//! through these traits.

use crate::autodiff::Scalar;
use crate::error::SolverError;
use crate::matrix::AdjacencyMatrix;
use crate::types::{Algorithm, FixedPointSolution};

/// A gradient-trained fixed-point ranking over some scalar field.
pub trait NonlinearRankSolver: Send + Sync {
    /// Scalar field the search runs in.
    type Scalar: Scalar;

    /// Search for the fixed point of `matrix`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] on invalid input or numerical instability.
    fn solve(
        &self,
        matrix: &AdjacencyMatrix,
    ) -> Result<FixedPointSolution<Self::Scalar>, SolverError>;

    /// Algorithm identifier for this solver.
    fn algorithm(&self) -> Algorithm;
}

/// A linear stationary-distribution ranking.
pub trait LinearRankSolver: Send + Sync {
    /// One score per node of `matrix`; nodes without edges score 0.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] on invalid input, numerical instability or
    /// non-convergence.
    fn rank(&self, matrix: &AdjacencyMatrix) -> Result<Vec<f64>, SolverError>;

    /// Algorithm identifier for this solver.
    fn algorithm(&self) -> Algorithm;
}
