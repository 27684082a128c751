//! Self-consistency training of the adjacency matrix.
//!
//! Trains the matrix toward `A · A′ᵀ ≈ I`, where `A′` starts as a copy of
//! `A`. Both copies receive the same momentum step, computed from the sum of
//! their gradients, so they stay identical throughout. The per-epoch cost is
//! recorded and can be written out as a JSON cost curve.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::autodiff::{Expr, ParamSet, Tensor};
use crate::config::FixedPointParams;
use crate::error::{SolverError, ValidationError};
use crate::fixed_point::{all_finite, apply_delta, clip_scaling, Momentum};
use crate::matrix::AdjacencyMatrix;
use crate::types::{Algorithm, ConvergenceInfo, GradientNorm};
use crate::validation::validate_fixed_point_params;

/// Outcome of a self-consistency training run.
#[derive(Debug, Clone, Serialize)]
pub struct SelfConsistencyOutcome {
    /// Matrix dimension.
    pub size: usize,
    /// Row-major weights before training.
    pub initial: Vec<f32>,
    /// Row-major weights after training.
    pub trained: Vec<f32>,
    /// `A · A′ᵀ` evaluated at the trained weights.
    pub product: Vec<f32>,
    /// Cost per epoch.
    pub history: Vec<ConvergenceInfo>,
    /// Epochs run.
    pub iterations: usize,
    /// Whether the cost dropped below the tolerance.
    pub converged: bool,
    /// Wall-clock time taken.
    pub wall_time: Duration,
}

#[derive(Serialize)]
struct CostCurve<'a> {
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
    points: Vec<(usize, f64)>,
}

impl SelfConsistencyOutcome {
    /// `(epoch, cost)` samples in epoch order.
    pub fn cost_samples(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.history.iter().map(|h| (h.iteration, h.loss))
    }

    /// The trained weights as an adjacency matrix.
    ///
    /// # Errors
    ///
    /// Training may drive weights negative; such a matrix is rejected.
    pub fn trained_matrix(&self) -> Result<AdjacencyMatrix, ValidationError> {
        AdjacencyMatrix::from_flat(self.size, self.trained.clone())
    }

    /// Write the "epochs vs cost" curve to `path` as JSON.
    ///
    /// # Errors
    ///
    /// [`SolverError::Artifact`] if encoding or writing fails.
    pub fn write_cost_curve(&self, path: impl AsRef<Path>) -> Result<(), SolverError> {
        let path = path.as_ref();
        let artifact = |reason: String| SolverError::Artifact {
            path: path.display().to_string(),
            reason,
        };
        let curve = CostCurve {
            title: "epochs vs cost",
            x_label: "epochs",
            y_label: "cost",
            points: self.cost_samples().collect(),
        };
        let json = serde_json::to_string_pretty(&curve).map_err(|e| artifact(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| artifact(e.to_string()))?;
        debug!(path = %path.display(), points = curve.points.len(), "cost curve written");
        Ok(())
    }
}

/// Trains a matrix toward self-consistency `A · Aᵀ ≈ I`.
#[derive(Debug, Clone)]
pub struct SelfConsistencySolver {
    params: FixedPointParams,
}

impl Default for SelfConsistencySolver {
    fn default() -> Self {
        Self::new(FixedPointParams::self_consistency())
    }
}

impl SelfConsistencySolver {
    /// Create a trainer with the given parameters.
    pub fn new(params: FixedPointParams) -> Self {
        Self { params }
    }

    /// Run training starting from `matrix`.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] for bad parameters and
    /// [`SolverError::NumericalInstability`] if the cost, gradients or
    /// weights stop being finite.
    #[instrument(skip(self, matrix), fields(n = matrix.size()))]
    pub fn train(&self, matrix: &AdjacencyMatrix) -> Result<SelfConsistencyOutcome, SolverError> {
        let algorithm = Algorithm::SelfConsistency;
        validate_fixed_point_params(algorithm.config_section(), &self.params)?;
        let start = Instant::now();
        let n = matrix.size();

        let mut set = ParamSet::<f32>::new();
        let a = set.add("A", matrix.to_tensor());
        let a_copy = set.add("A'", matrix.to_tensor());
        let identity = set.add("I", Tensor::identity(n));

        let product = Expr::mul(Expr::param(a), Expr::param(a_copy));
        let cost = Expr::avg(Expr::quadratic(Expr::param(identity), product.clone()));

        let mut momentum = Momentum::new(n * n, &self.params);
        let mut combined = vec![0.0f32; n * n];
        let mut history = Vec::with_capacity(self.params.iterations);
        let mut converged = false;
        let mut iterations = 0;

        for iteration in 0..self.params.iterations {
            let total = cost.gradient(&mut set)?;
            if !total.is_finite() || !all_finite(set.grad(a)) || !all_finite(set.grad(a_copy)) {
                return Err(SolverError::NumericalInstability {
                    algorithm,
                    iteration,
                    detail: format!("non-finite cost or gradient (cost = {total})"),
                });
            }

            let both = set.grad(a).iter().chain(set.grad(a_copy)).copied();
            let (scaling, gradient_norm) = clip_scaling(both, GradientNorm::PrincipalRoot);
            for ((c, &ga), &gb) in combined.iter_mut().zip(set.grad(a)).zip(set.grad(a_copy)) {
                *c = ga + gb;
            }

            let delta = momentum.update(&combined, scaling);
            apply_delta(set.values_mut(a), delta);
            apply_delta(set.values_mut(a_copy), delta);
            if !all_finite(&set.value(a).values) {
                return Err(SolverError::NumericalInstability {
                    algorithm,
                    iteration,
                    detail: "weights became non-finite".into(),
                });
            }

            let loss = total as f64;
            history.push(ConvergenceInfo {
                iteration,
                loss,
                gradient_norm,
            });
            debug!(iteration, cost = loss, gradient_norm, "self-consistency epoch");

            iterations = iteration + 1;
            if loss < self.params.tolerance {
                converged = true;
                break;
            }
        }

        let product = product.eval(&set)?.values;
        let final_cost = history.last().map_or(f64::NAN, |h| h.loss);
        if converged {
            info!(iterations, final_cost, "self-consistency reached");
        } else {
            warn!(
                iterations,
                final_cost,
                tolerance = self.params.tolerance,
                "self-consistency training did not reach tolerance"
            );
        }

        Ok(SelfConsistencyOutcome {
            size: n,
            initial: matrix.values().to_vec(),
            trained: set.value(a).values.clone(),
            product,
            history,
            iterations,
            converged,
            wall_time: start.elapsed(),
        })
    }
}
