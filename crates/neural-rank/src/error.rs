//! Error types for the ranking crate.
//!
//! Provides structured error variants for numerical instabilities, PageRank
//! non-convergence, invalid inputs and artifact/configuration I/O. All errors
//! implement `std::error::Error` via `thiserror`.

use crate::types::Algorithm;

/// Primary error type for solver and experiment operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The power iteration did not converge within the allowed iteration cap.
    #[error(
        "{algorithm} did not converge after {iterations} iterations (residual={residual:.2e}, tol={tolerance:.2e})"
    )]
    NonConvergence {
        /// Algorithm that gave up.
        algorithm: Algorithm,
        /// Number of iterations completed before the cap was hit.
        iterations: usize,
        /// Final residual at termination.
        residual: f64,
        /// Target tolerance that was not reached.
        tolerance: f64,
    },

    /// A NaN or infinity appeared in a loss, gradient, iterate or rank vector.
    #[error("numerical instability in {algorithm} at iteration {iteration}: {detail}")]
    NumericalInstability {
        /// Algorithm that produced the non-finite value.
        algorithm: Algorithm,
        /// Iteration at which the instability was detected.
        iteration: usize,
        /// Human-readable explanation.
        detail: String,
    },

    /// The caller supplied invalid input (dimensions, weights, parameters).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Loading a configuration file failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Writing an output artifact (cost curve) failed.
    #[error("failed to write artifact {path}: {reason}")]
    Artifact {
        /// Destination that could not be written.
        path: String,
        /// Underlying I/O or encoding failure.
        reason: String,
    },
}

/// Validation errors for matrices, vectors, expressions and parameters.
///
/// These are raised eagerly before any iteration begins so that callers get
/// clear diagnostics rather than garbage scores.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Sizes are inconsistent (matrix size vs configured N, operand shapes).
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An edge weight is negative. PageRank semantics need weights >= 0.
    #[error("negative edge weight {value} at ({row}, {col})")]
    NegativeWeight {
        /// Row (destination node) of the offending entry.
        row: usize,
        /// Column (source node) of the offending entry.
        col: usize,
        /// The offending weight.
        value: f64,
    },

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A node index does not exist in the graph.
    #[error("node {node} out of bounds for {node_count} nodes")]
    NodeOutOfBounds {
        /// Offending node index.
        node: usize,
        /// Number of nodes in the graph.
        node_count: usize,
    },

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SolverError>;
