//! Momentum fixed-point search shared by the real and complex rank solvers.
//!
//! Given a square matrix `A` the search looks for a score vector `x` that
//! reproduces itself after being propagated through `A` twice with a softmax
//! after each step:
//!
//! ```text
//! layer1 = softmax(A · x)
//! layer2 = softmax(A · layer1)
//! loss   = avg(quadratic(x, layer2))
//! ```
//!
//! Starting from `x = 0` each iteration differentiates the loss with respect
//! to `x`, clips the gradient to unit norm and takes a momentum step:
//!
//! ```text
//! g        = ∂loss/∂x
//! scaling  = 1/‖g‖   if |‖g‖| > 1, else 1
//! velocity = α·velocity − η·scaling·g
//! x        = x + velocity
//! ```
//!
//! The loop stops after the iteration whose loss magnitude is below the
//! tolerance, or once the budget is spent.

use std::time::Instant;

use tracing::{debug, instrument};

use crate::autodiff::{Expr, ParamId, ParamSet, Scalar, Tensor};
use crate::config::FixedPointParams;
use crate::error::{SolverError, ValidationError};
use crate::types::{Algorithm, ConvergenceInfo, FixedPointSolution, GradientNorm};
use crate::validation::validate_fixed_point_params;

// ---------------------------------------------------------------------------
// Shared update machinery
// ---------------------------------------------------------------------------

/// Compute the clipping factor for a gradient.
///
/// Returns `(scaling, |norm|)`. The norm is computed according to `policy`;
/// for real scalars both policies give the Euclidean norm.
pub(crate) fn clip_scaling<S: Scalar>(
    gradient: impl IntoIterator<Item = S>,
    policy: GradientNorm,
) -> (S, f64) {
    let norm = match policy {
        GradientNorm::PrincipalRoot => gradient
            .into_iter()
            .fold(S::zero(), |acc, d| acc + d * d)
            .sqrt(),
        GradientNorm::Magnitude => {
            let sq: f64 = gradient
                .into_iter()
                .map(|d| {
                    let m = d.magnitude();
                    m * m
                })
                .sum();
            S::from_f64(sq.sqrt())
        }
    };
    let magnitude = norm.magnitude();
    if magnitude > 1.0 {
        (S::one() / norm, magnitude)
    } else {
        (S::one(), magnitude)
    }
}

/// Velocity buffer of a momentum update.
#[derive(Debug, Clone)]
pub(crate) struct Momentum<S> {
    velocity: Vec<S>,
    momentum: S,
    learning_rate: S,
}

impl<S: Scalar> Momentum<S> {
    pub(crate) fn new(len: usize, params: &FixedPointParams) -> Self {
        Self {
            velocity: vec![S::zero(); len],
            momentum: S::from_f64(params.momentum),
            learning_rate: S::from_f64(params.learning_rate),
        }
    }

    /// `velocity = α·velocity − η·scaling·gradient`; returns the new velocity.
    pub(crate) fn update(&mut self, gradient: &[S], scaling: S) -> &[S] {
        for (v, &d) in self.velocity.iter_mut().zip(gradient) {
            *v = self.momentum * *v - self.learning_rate * d * scaling;
        }
        &self.velocity
    }
}

/// Add `delta` to `values` element-wise.
pub(crate) fn apply_delta<S: Scalar>(values: &mut [S], delta: &[S]) {
    for (x, &v) in values.iter_mut().zip(delta) {
        *x += v;
    }
}

pub(crate) fn all_finite<S: Scalar>(values: &[S]) -> bool {
    values.iter().all(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn propagate(a: ParamId, input: Expr) -> Expr {
    Expr::softmax(Expr::mul(Expr::param(a), input))
}

/// Run the two-layer softmax fixed-point search over `matrix`.
///
/// # Errors
///
/// - [`SolverError::InvalidInput`] if `matrix` is not square or `params` are
///   out of range.
/// - [`SolverError::NumericalInstability`] if the loss, gradient or iterate
///   stops being finite.
#[instrument(skip(matrix, params), fields(n = matrix.height))]
pub fn search<S: Scalar>(
    matrix: Tensor<S>,
    params: &FixedPointParams,
    norm: GradientNorm,
    algorithm: Algorithm,
) -> Result<FixedPointSolution<S>, SolverError> {
    validate_fixed_point_params(algorithm.config_section(), params)?;
    if matrix.width != matrix.height || matrix.is_empty() {
        return Err(ValidationError::DimensionMismatch(format!(
            "fixed-point search needs a non-empty square matrix, got {}x{}",
            matrix.width, matrix.height
        ))
        .into());
    }

    let start = Instant::now();
    let n = matrix.height;

    let mut set = ParamSet::new();
    let a = set.add("A", matrix);
    let x = set.add("x", Tensor::vector(vec![S::zero(); n]));

    let layer1 = propagate(a, Expr::param(x));
    let layer2 = propagate(a, layer1.clone());
    let cost = Expr::avg(Expr::quadratic(Expr::param(x), layer2.clone()));

    let mut momentum = Momentum::new(n, params);
    let mut history = Vec::with_capacity(params.iterations);
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 0..params.iterations {
        let loss = cost.gradient(&mut set)?;
        if !loss.is_finite() || !all_finite(set.grad(x)) {
            return Err(SolverError::NumericalInstability {
                algorithm,
                iteration,
                detail: format!("non-finite loss or gradient (loss = {loss:?})"),
            });
        }

        let (scaling, gradient_norm) = clip_scaling(set.grad(x).iter().copied(), norm);
        let loss = loss.magnitude();
        history.push(ConvergenceInfo {
            iteration,
            loss,
            gradient_norm,
        });
        debug!(iteration, loss, gradient_norm, "fixed-point iteration");

        let (values, gradient) = set.value_and_grad_mut(x);
        apply_delta(values, momentum.update(gradient, scaling));
        if !all_finite(values) {
            return Err(SolverError::NumericalInstability {
                algorithm,
                iteration,
                detail: "score vector became non-finite".into(),
            });
        }

        iterations = iteration + 1;
        if loss < params.tolerance {
            converged = true;
            break;
        }
    }

    let layers = vec![layer1.eval(&set)?.values, layer2.eval(&set)?.values];
    let final_loss = history.last().map_or(f64::NAN, |h| h.loss);
    let wall_time = start.elapsed();

    if converged {
        debug!(iterations, final_loss, "fixed point reached");
    } else {
        debug!(
            iterations,
            final_loss,
            tolerance = params.tolerance,
            "iteration budget spent before loss fell below tolerance"
        );
    }

    Ok(FixedPointSolution {
        scores: set.value(x).values.clone(),
        layers,
        iterations,
        converged,
        final_loss,
        convergence_history: history,
        wall_time,
        algorithm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    #[test]
    fn clipping_normalizes_large_real_gradients() {
        let (s, norm) = clip_scaling([3.0f64, 4.0], GradientNorm::PrincipalRoot);
        assert_relative_eq!(norm, 5.0);
        assert_relative_eq!(s, 0.2);
    }

    #[test]
    fn small_gradients_are_not_scaled() {
        let (s, norm) = clip_scaling([0.3f32, 0.4], GradientNorm::Magnitude);
        assert_relative_eq!(norm, 0.5, epsilon = 1e-6);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn complex_principal_root_differs_from_magnitude() {
        // Σd² = (2i)² = -4, principal root 2i; magnitude norm is 2.
        let g = [Complex64::new(0.0, 2.0)];
        let (s_root, n_root) = clip_scaling(g, GradientNorm::PrincipalRoot);
        let (s_mag, n_mag) = clip_scaling(g, GradientNorm::Magnitude);
        assert_relative_eq!(n_root, 2.0, epsilon = 1e-12);
        assert_relative_eq!(n_mag, 2.0, epsilon = 1e-12);
        assert_relative_eq!(s_root.im, -0.5, epsilon = 1e-12);
        assert_relative_eq!(s_mag.re, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let params = FixedPointParams::default();
        let mut m = Momentum::<f64>::new(1, &params);
        assert_relative_eq!(m.update(&[1.0], 1.0)[0], -0.3);
        assert_relative_eq!(m.update(&[1.0], 1.0)[0], 0.3 * -0.3 - 0.3);
    }

    #[test]
    fn rejects_non_square_matrix() {
        let t = Tensor::<f64>::zeros(3, 2);
        let err = search(
            t,
            &FixedPointParams::default(),
            GradientNorm::PrincipalRoot,
            Algorithm::RealFixedPoint,
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)));
    }

    #[test]
    fn parameter_errors_name_the_algorithm_section() {
        let params = FixedPointParams {
            iterations: 0,
            ..FixedPointParams::default()
        };
        for (algorithm, expected) in [
            (Algorithm::RealFixedPoint, "solver.iterations"),
            (Algorithm::ComplexFixedPoint, "solver.iterations"),
            (Algorithm::SelfConsistency, "self_consistency.iterations"),
        ] {
            let t = Tensor::matrix(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
            let err = search::<f64>(t, &params, GradientNorm::PrincipalRoot, algorithm)
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    SolverError::InvalidInput(ValidationError::ParameterOutOfRange { ref name, .. })
                        if name == expected
                ),
                "{algorithm}: {err}"
            );
        }
    }

    #[test]
    fn layers_are_distributions() {
        let t = Tensor::matrix(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let sol = search::<f64>(
            t,
            &FixedPointParams::default(),
            GradientNorm::PrincipalRoot,
            Algorithm::RealFixedPoint,
        )
        .unwrap();
        assert_eq!(sol.layers.len(), 2);
        for layer in &sol.layers {
            assert_relative_eq!(layer.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(sol.convergence_history.len(), sol.iterations);
    }
}
