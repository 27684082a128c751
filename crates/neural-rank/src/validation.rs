//! Input validation for matrices, edge lists and parameters.
//!
//! All checks run eagerly before any iteration begins so that callers get a
//! clear diagnostic instead of a meaningless ranking. Every function returns
//! [`ValidationError`] on failure, which converts into
//! [`SolverError::InvalidInput`](crate::error::SolverError::InvalidInput) via
//! `From`.
//!
//! # Limits
//!
//! | Resource        | Limit      | Constant             |
//! |-----------------|------------|----------------------|
//! | Matrix size N   | 64         | [`MAX_SIZE`]         |
//! | Iterations      | 1,000,000  | [`MAX_ITERATIONS`]   |
//! | Monte Carlo runs| 1,000,000  | [`MAX_TRIALS`]       |

use crate::config::{ExperimentConfig, FixedPointParams, PageRankParams};
use crate::error::ValidationError;
use crate::matrix::WeightedEdge;

// ---------------------------------------------------------------------------
// Resource limits
// ---------------------------------------------------------------------------

/// Largest supported matrix dimension. The solvers are dense.
pub const MAX_SIZE: usize = 64;

/// Maximum iteration budget for any solver.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Maximum number of Monte Carlo trials.
pub const MAX_TRIALS: usize = 1_000_000;

// ---------------------------------------------------------------------------
// Matrices and edges
// ---------------------------------------------------------------------------

/// Check a matrix dimension against `1..=MAX_SIZE`.
pub fn validate_matrix_size(size: usize) -> Result<(), ValidationError> {
    if size == 0 || size > MAX_SIZE {
        return Err(ValidationError::ParameterOutOfRange {
            name: "size".into(),
            value: size.to_string(),
            expected: format!("1..={MAX_SIZE}"),
        });
    }
    Ok(())
}

/// Validate row-major adjacency values for an `size x size` matrix.
///
/// Checks, in order: the dimension bound, `values.len() == size²`, then every
/// entry for finiteness and non-negativity.
///
/// # Errors
///
/// The first violation found.
pub fn validate_adjacency_values(size: usize, values: &[f32]) -> Result<(), ValidationError> {
    validate_matrix_size(size)?;
    if values.len() != size * size {
        return Err(ValidationError::DimensionMismatch(format!(
            "{size}x{size} matrix needs {} entries, got {}",
            size * size,
            values.len(),
        )));
    }
    for (idx, &v) in values.iter().enumerate() {
        let (row, col) = (idx / size, idx % size);
        if !v.is_finite() {
            return Err(ValidationError::NonFiniteValue(format!(
                "matrix entry ({row}, {col}) = {v}"
            )));
        }
        if v < 0.0 {
            return Err(ValidationError::NegativeWeight {
                row,
                col,
                value: v as f64,
            });
        }
    }
    Ok(())
}

/// Validate a directed edge list for a graph of `node_count` nodes.
pub fn validate_edges(node_count: usize, edges: &[WeightedEdge]) -> Result<(), ValidationError> {
    for e in edges {
        for node in [e.source, e.target] {
            if node >= node_count {
                return Err(ValidationError::NodeOutOfBounds { node, node_count });
            }
        }
        if !e.weight.is_finite() {
            return Err(ValidationError::NonFiniteValue(format!(
                "edge {} -> {} weight {}",
                e.source, e.target, e.weight
            )));
        }
        if e.weight < 0.0 {
            return Err(ValidationError::NegativeWeight {
                row: e.target,
                col: e.source,
                value: e.weight,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

fn out_of_range(name: &str, value: impl ToString, expected: &str) -> ValidationError {
    ValidationError::ParameterOutOfRange {
        name: name.into(),
        value: value.to_string(),
        expected: expected.into(),
    }
}

/// Validate fixed-point search parameters. `prefix` names the parameter
/// group in error messages (e.g. `solver`).
pub fn validate_fixed_point_params(
    prefix: &str,
    params: &FixedPointParams,
) -> Result<(), ValidationError> {
    if params.iterations == 0 || params.iterations > MAX_ITERATIONS {
        return Err(out_of_range(
            &format!("{prefix}.iterations"),
            params.iterations,
            "1..=1000000",
        ));
    }
    if !params.learning_rate.is_finite() || params.learning_rate <= 0.0 {
        return Err(out_of_range(
            &format!("{prefix}.learning_rate"),
            params.learning_rate,
            "finite and > 0",
        ));
    }
    if !params.momentum.is_finite() || !(0.0..1.0).contains(&params.momentum) {
        return Err(out_of_range(
            &format!("{prefix}.momentum"),
            params.momentum,
            "[0, 1)",
        ));
    }
    if !params.tolerance.is_finite() || params.tolerance <= 0.0 {
        return Err(out_of_range(
            &format!("{prefix}.tolerance"),
            params.tolerance,
            "finite and > 0",
        ));
    }
    Ok(())
}

/// Validate PageRank parameters.
pub fn validate_pagerank_params(params: &PageRankParams) -> Result<(), ValidationError> {
    if !params.damping.is_finite() || params.damping <= 0.0 || params.damping >= 1.0 {
        return Err(out_of_range("pagerank.damping", params.damping, "(0, 1)"));
    }
    if !params.tolerance.is_finite() || params.tolerance <= 0.0 {
        return Err(out_of_range(
            "pagerank.tolerance",
            params.tolerance,
            "finite and > 0",
        ));
    }
    if params.max_iterations == 0 || params.max_iterations > MAX_ITERATIONS {
        return Err(out_of_range(
            "pagerank.max_iterations",
            params.max_iterations,
            "1..=1000000",
        ));
    }
    Ok(())
}

/// Validate a full experiment configuration.
pub fn validate_config(config: &ExperimentConfig) -> Result<(), ValidationError> {
    validate_matrix_size(config.size)?;
    if config.trials == 0 || config.trials > MAX_TRIALS {
        return Err(out_of_range("trials", config.trials, "1..=1000000"));
    }
    validate_fixed_point_params("solver", &config.solver)?;
    validate_fixed_point_params("self_consistency", &config.self_consistency)?;
    validate_pagerank_params(&config.pagerank)
}
