//! Reverse-mode differentiation over small dense expressions.
//!
//! An [`Expr`] is a tree whose nodes own their children by value. Leaves refer
//! to parameters stored in a [`ParamSet`]; interior nodes are one of four
//! operators:
//!
//! | Operator    | Shape rule                                  | Value                                   |
//! |-------------|---------------------------------------------|-----------------------------------------|
//! | `mul`       | `(w, ha) x (w, hb) -> (ha, hb)`             | `out[i + j*ha] = a_row_i · b_row_j`      |
//! | `softmax`   | shape preserved                             | `exp(a_i) / Σ_j exp(a_j)` over all items |
//! | `quadratic` | `(w, h) x (w, h) -> (h, 1)`                 | per-row `Σ_k (a_ik - b_ik)²`             |
//! | `avg`       | `(w, h) -> (1, 1)`                          | mean of all elements                    |
//!
//! Shapes are `(width, height)` with row-major storage, so `mul(A, x)` is the
//! usual matrix-vector product `A·x` and `mul(A, B)` is `A·Bᵀ`.
//!
//! [`Expr::gradient`] runs a forward pass that records every intermediate
//! value in a trace, then walks the trace backwards accumulating derivatives
//! into the parameter gradient buffers. Derivatives follow the ordinary
//! chain rule, which for complex scalars is the holomorphic derivative.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use num_complex::Complex64;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// Field element the differentiation engine and solvers operate on.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
{
    /// Additive identity.
    fn zero() -> Self;
    /// Multiplicative identity.
    fn one() -> Self;
    /// Embed a real number.
    fn from_f64(value: f64) -> Self;
    /// Exponential function.
    fn exp(self) -> Self;
    /// Principal square root.
    fn sqrt(self) -> Self;
    /// Absolute value / modulus.
    fn magnitude(self) -> f64;
    /// Real part.
    fn real(self) -> f64;
    /// `false` if any component is NaN or infinite.
    fn is_finite(self) -> bool;

    /// Key used to order scores when building rankings.
    fn rank_key(self) -> f64 {
        self.magnitude()
    }
}

impl Scalar for f32 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(value: f64) -> Self {
        value as f32
    }
    fn exp(self) -> Self {
        f32::exp(self)
    }
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }
    fn magnitude(self) -> f64 {
        f32::abs(self) as f64
    }
    fn real(self) -> f64 {
        self as f64
    }
    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
    fn rank_key(self) -> f64 {
        self as f64
    }
}

impl Scalar for f64 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(value: f64) -> Self {
        value
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    fn magnitude(self) -> f64 {
        f64::abs(self)
    }
    fn real(self) -> f64 {
        self
    }
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
    fn rank_key(self) -> f64 {
        self
    }
}

impl Scalar for Complex64 {
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }
    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }
    fn from_f64(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }
    fn exp(self) -> Self {
        Complex64::exp(self)
    }
    fn sqrt(self) -> Self {
        Complex64::sqrt(self)
    }
    fn magnitude(self) -> f64 {
        self.norm()
    }
    fn real(self) -> f64 {
        self.re
    }
    fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Tensor
// ---------------------------------------------------------------------------

/// Dense row-major tensor of shape `(width, height)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<S> {
    /// Row-major values, `width * height` of them.
    pub values: Vec<S>,
    /// Number of columns (row length).
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl<S: Scalar> Tensor<S> {
    /// A single-row tensor.
    pub fn vector(values: Vec<S>) -> Self {
        let width = values.len();
        Self {
            values,
            width,
            height: 1,
        }
    }

    /// A `width x height` tensor from row-major values.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] if `values.len() != width * height`.
    pub fn matrix(width: usize, height: usize, values: Vec<S>) -> Result<Self, ValidationError> {
        if values.len() != width * height {
            return Err(ValidationError::DimensionMismatch(format!(
                "tensor {}x{} needs {} values, got {}",
                width,
                height,
                width * height,
                values.len(),
            )));
        }
        Ok(Self {
            values,
            width,
            height,
        })
    }

    /// All-zero tensor.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            values: vec![S::zero(); width * height],
            width,
            height,
        }
    }

    /// `n x n` identity.
    pub fn identity(n: usize) -> Self {
        let mut t = Self::zeros(n, n);
        for i in 0..n {
            t.values[i * n + i] = S::one();
        }
        t
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the tensor holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[S] {
        &self.values[i * self.width..(i + 1) * self.width]
    }

    /// The single element of a `1 x 1` tensor.
    pub fn scalar(&self) -> Option<S> {
        match self.values.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Handle to a parameter inside a [`ParamSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

/// Named parameter tensors together with their derivative buffers.
#[derive(Debug, Clone)]
pub struct ParamSet<S> {
    names: Vec<String>,
    values: Vec<Tensor<S>>,
    grads: Vec<Vec<S>>,
}

impl<S: Scalar> Default for ParamSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scalar> ParamSet<S> {
    /// Empty set.
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
            grads: Vec::new(),
        }
    }

    /// Register a parameter and return its handle.
    pub fn add(&mut self, name: impl Into<String>, value: Tensor<S>) -> ParamId {
        self.names.push(name.into());
        self.grads.push(vec![S::zero(); value.len()]);
        self.values.push(value);
        ParamId(self.values.len() - 1)
    }

    /// Look a parameter up by name.
    pub fn by_name(&self, name: &str) -> Option<ParamId> {
        self.names.iter().position(|n| n == name).map(ParamId)
    }

    /// Name of a parameter.
    pub fn name(&self, id: ParamId) -> &str {
        &self.names[id.0]
    }

    /// Current value of a parameter.
    pub fn value(&self, id: ParamId) -> &Tensor<S> {
        &self.values[id.0]
    }

    /// Mutable access to a parameter's values.
    pub fn values_mut(&mut self, id: ParamId) -> &mut [S] {
        &mut self.values[id.0].values
    }

    /// Derivative buffer populated by the last [`Expr::gradient`] call.
    pub fn grad(&self, id: ParamId) -> &[S] {
        &self.grads[id.0]
    }

    /// Split borrow: a parameter's values mutably and its gradient immutably.
    pub fn value_and_grad_mut(&mut self, id: ParamId) -> (&mut [S], &[S]) {
        (&mut self.values[id.0].values, &self.grads[id.0])
    }

    /// Reset every derivative buffer to zero.
    pub fn zero_grads(&mut self) {
        for g in &mut self.grads {
            g.iter_mut().for_each(|d| *d = S::zero());
        }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if no parameters are registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn lookup(&self, id: ParamId) -> Result<&Tensor<S>, ValidationError> {
        self.values.get(id.0).ok_or_else(|| {
            ValidationError::DimensionMismatch(format!(
                "parameter #{} not registered ({} parameters)",
                id.0,
                self.values.len(),
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

/// Differentiable expression. Children are owned by value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Parameter leaf.
    Param(ParamId),
    /// Row-by-row product, see the module table.
    Mul(Box<Expr>, Box<Expr>),
    /// Softmax over all elements.
    Softmax(Box<Expr>),
    /// Per-row sum of squared differences.
    Quadratic(Box<Expr>, Box<Expr>),
    /// Mean of all elements.
    Avg(Box<Expr>),
}

/// Forward values recorded for the backward pass, mirroring the tree shape.
#[derive(Debug)]
struct Trace<S> {
    value: Tensor<S>,
    inputs: Vec<Trace<S>>,
}

impl Expr {
    /// Parameter leaf.
    pub fn param(id: ParamId) -> Self {
        Expr::Param(id)
    }

    /// `mul(a, b)`.
    pub fn mul(a: Expr, b: Expr) -> Self {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    /// `softmax(a)`.
    pub fn softmax(a: Expr) -> Self {
        Expr::Softmax(Box::new(a))
    }

    /// `quadratic(a, b)`.
    pub fn quadratic(a: Expr, b: Expr) -> Self {
        Expr::Quadratic(Box::new(a), Box::new(b))
    }

    /// `avg(a)`.
    pub fn avg(a: Expr) -> Self {
        Expr::Avg(Box::new(a))
    }

    /// Evaluate the expression.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] on incompatible operand shapes
    /// or unknown parameters.
    pub fn eval<S: Scalar>(&self, params: &ParamSet<S>) -> Result<Tensor<S>, ValidationError> {
        Ok(self.forward(params)?.value)
    }

    /// Evaluate a scalar-valued expression and populate the derivative buffer
    /// of every parameter with `∂output/∂param`.
    ///
    /// Buffers are cleared first, so the call keeps no state from previous
    /// invocations.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] on shape errors or when the
    /// expression does not evaluate to a single element.
    pub fn gradient<S: Scalar>(&self, params: &mut ParamSet<S>) -> Result<S, ValidationError> {
        let trace = self.forward(params)?;
        let output = trace.value.scalar().ok_or_else(|| {
            ValidationError::DimensionMismatch(format!(
                "gradient needs a scalar output, got {}x{}",
                trace.value.width, trace.value.height,
            ))
        })?;

        params.zero_grads();
        self.backward(&trace, &[S::one()], params);
        Ok(output)
    }

    fn forward<S: Scalar>(&self, params: &ParamSet<S>) -> Result<Trace<S>, ValidationError> {
        match self {
            Expr::Param(id) => Ok(Trace {
                value: params.lookup(*id)?.clone(),
                inputs: Vec::new(),
            }),

            Expr::Mul(a, b) => {
                let ta = a.forward(params)?;
                let tb = b.forward(params)?;
                let value = mul_forward(&ta.value, &tb.value)?;
                Ok(Trace {
                    value,
                    inputs: vec![ta, tb],
                })
            }

            Expr::Softmax(a) => {
                let ta = a.forward(params)?;
                let value = softmax_forward(&ta.value);
                Ok(Trace {
                    value,
                    inputs: vec![ta],
                })
            }

            Expr::Quadratic(a, b) => {
                let ta = a.forward(params)?;
                let tb = b.forward(params)?;
                let (va, vb) = (&ta.value, &tb.value);
                if va.width != vb.width || va.height != vb.height {
                    return Err(ValidationError::DimensionMismatch(format!(
                        "quadratic operands {}x{} and {}x{} differ",
                        va.width, va.height, vb.width, vb.height,
                    )));
                }
                let rows = (0..va.height)
                    .map(|r| {
                        va.row(r)
                            .iter()
                            .zip(vb.row(r))
                            .fold(S::zero(), |acc, (&x, &y)| {
                                let p = x - y;
                                acc + p * p
                            })
                    })
                    .collect();
                Ok(Trace {
                    value: Tensor::vector(rows),
                    inputs: vec![ta, tb],
                })
            }

            Expr::Avg(a) => {
                let ta = a.forward(params)?;
                if ta.value.is_empty() {
                    return Err(ValidationError::DimensionMismatch(
                        "avg of an empty tensor".into(),
                    ));
                }
                let n = S::from_f64(ta.value.len() as f64);
                let sum = ta.value.values.iter().fold(S::zero(), |acc, &v| acc + v);
                Ok(Trace {
                    value: Tensor::vector(vec![sum / n]),
                    inputs: vec![ta],
                })
            }
        }
    }

    fn backward<S: Scalar>(&self, trace: &Trace<S>, upstream: &[S], params: &mut ParamSet<S>) {
        match self {
            Expr::Param(id) => {
                for (g, &d) in params.grads[id.0].iter_mut().zip(upstream) {
                    *g += d;
                }
            }

            Expr::Mul(a, b) => {
                let (va, vb) = (&trace.inputs[0].value, &trace.inputs[1].value);
                let (w, ha) = (va.width, va.height);
                let mut da = vec![S::zero(); va.len()];
                let mut db = vec![S::zero(); vb.len()];
                for j in 0..vb.height {
                    for i in 0..ha {
                        let d = upstream[i + j * ha];
                        for k in 0..w {
                            da[i * w + k] += d * vb.values[j * w + k];
                            db[j * w + k] += d * va.values[i * w + k];
                        }
                    }
                }
                a.backward(&trace.inputs[0], &da, params);
                b.backward(&trace.inputs[1], &db, params);
            }

            Expr::Softmax(a) => {
                let s = &trace.value.values;
                let dot = s
                    .iter()
                    .zip(upstream)
                    .fold(S::zero(), |acc, (&si, &di)| acc + si * di);
                let da: Vec<S> = s
                    .iter()
                    .zip(upstream)
                    .map(|(&si, &di)| si * (di - dot))
                    .collect();
                a.backward(&trace.inputs[0], &da, params);
            }

            Expr::Quadratic(a, b) => {
                let (va, vb) = (&trace.inputs[0].value, &trace.inputs[1].value);
                let w = va.width;
                let two = S::from_f64(2.0);
                let mut da = vec![S::zero(); va.len()];
                let mut db = vec![S::zero(); vb.len()];
                for (r, &d) in upstream.iter().enumerate().take(va.height) {
                    for k in 0..w {
                        let idx = r * w + k;
                        let g = two * (va.values[idx] - vb.values[idx]) * d;
                        da[idx] = g;
                        db[idx] = -g;
                    }
                }
                a.backward(&trace.inputs[0], &da, params);
                b.backward(&trace.inputs[1], &db, params);
            }

            Expr::Avg(a) => {
                let input = &trace.inputs[0].value;
                let share = upstream[0] / S::from_f64(input.len() as f64);
                let da = vec![share; input.len()];
                a.backward(&trace.inputs[0], &da, params);
            }
        }
    }
}

fn mul_forward<S: Scalar>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>, ValidationError> {
    if a.width != b.width {
        return Err(ValidationError::DimensionMismatch(format!(
            "mul operands have row lengths {} and {}",
            a.width, b.width,
        )));
    }
    let (ha, hb) = (a.height, b.height);
    let mut out = Tensor::zeros(ha, hb);
    for j in 0..hb {
        let bj = b.row(j);
        for i in 0..ha {
            out.values[i + j * ha] = a
                .row(i)
                .iter()
                .zip(bj)
                .fold(S::zero(), |acc, (&x, &y)| acc + x * y);
        }
    }
    Ok(out)
}

/// Softmax over every element, shifted by the largest real part.
///
/// The shift cancels in the ratio, so the result equals the unshifted
/// definition for real and complex inputs alike.
fn softmax_forward<S: Scalar>(a: &Tensor<S>) -> Tensor<S> {
    let shift = a
        .values
        .iter()
        .map(|v| v.real())
        .fold(f64::NEG_INFINITY, f64::max);
    let shift = if shift.is_finite() { S::from_f64(shift) } else { S::zero() };

    let exps: Vec<S> = a.values.iter().map(|&v| (v - shift).exp()).collect();
    let sum = exps.iter().fold(S::zero(), |acc, &e| acc + e);
    Tensor {
        values: exps.into_iter().map(|e| e / sum).collect(),
        width: a.width,
        height: a.height,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_layer_cost(a: ParamId, x: ParamId) -> Expr {
        let l1 = Expr::softmax(Expr::mul(Expr::param(a), Expr::param(x)));
        let l2 = Expr::softmax(Expr::mul(Expr::param(a), l1));
        Expr::avg(Expr::quadratic(Expr::param(x), l2))
    }

    fn sample_set() -> (ParamSet<f64>, ParamId, ParamId) {
        let mut set = ParamSet::new();
        let a = set.add(
            "A",
            Tensor::matrix(3, 3, vec![0.0, 0.7, 0.2, 0.5, 0.0, 1.1, 0.3, 0.4, 0.0]).unwrap(),
        );
        let x = set.add("x", Tensor::vector(vec![0.1, -0.2, 0.35]));
        (set, a, x)
    }

    #[test]
    fn mul_is_matrix_vector_product() {
        let mut set = ParamSet::<f64>::new();
        let a = set.add("A", Tensor::matrix(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let x = set.add("x", Tensor::vector(vec![1.0, -1.0]));
        let y = Expr::mul(Expr::param(a), Expr::param(x)).eval(&set).unwrap();
        assert_eq!(y.values, vec![-1.0, -1.0]);
        assert_eq!((y.width, y.height), (2, 1));
    }

    #[test]
    fn mul_of_matrices_is_a_times_b_transpose() {
        let mut set = ParamSet::<f64>::new();
        let a = set.add("A", Tensor::matrix(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let b = set.add("B", Tensor::matrix(2, 2, vec![1.0, 0.0, 1.0, 1.0]).unwrap());
        let c = Expr::mul(Expr::param(a), Expr::param(b)).eval(&set).unwrap();
        // out[i + 2j] = a_row_i · b_row_j
        assert_eq!(c.values, vec![1.0, 3.0, 3.0, 7.0]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut set = ParamSet::<f64>::new();
        let x = set.add("x", Tensor::vector(vec![1.0, 2.0, 3.0, 400.0]));
        let s = Expr::softmax(Expr::param(x)).eval(&set).unwrap();
        let total: f64 = s.values.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert!(s.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let (mut set, a, x) = sample_set();
        let cost = two_layer_cost(a, x);
        cost.gradient(&mut set).unwrap();
        let grad_x = set.grad(x).to_vec();
        let grad_a = set.grad(a).to_vec();

        let h = 1e-6;
        for (id, analytic) in [(x, grad_x), (a, grad_a)] {
            for i in 0..analytic.len() {
                let mut plus = set.clone();
                plus.values_mut(id)[i] += h;
                let mut minus = set.clone();
                minus.values_mut(id)[i] -= h;
                let fp = cost.eval(&plus).unwrap().values[0];
                let fm = cost.eval(&minus).unwrap().values[0];
                let numeric = (fp - fm) / (2.0 * h);
                assert_relative_eq!(analytic[i], numeric, epsilon = 1e-7, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn gradient_clears_previous_buffers() {
        let (mut set, a, x) = sample_set();
        let cost = two_layer_cost(a, x);
        cost.gradient(&mut set).unwrap();
        let first = set.grad(x).to_vec();
        cost.gradient(&mut set).unwrap();
        assert_eq!(first, set.grad(x).to_vec());
    }

    #[test]
    fn complex_gradient_is_holomorphic_derivative() {
        let mut set = ParamSet::<Complex64>::new();
        let a = set.add(
            "A",
            Tensor::matrix(
                2,
                2,
                vec![
                    Complex64::new(0.0, 0.0),
                    Complex64::new(0.5, 0.25),
                    Complex64::new(0.5, -0.25),
                    Complex64::new(0.0, 0.0),
                ],
            )
            .unwrap(),
        );
        let x = set.add(
            "x",
            Tensor::vector(vec![Complex64::new(0.2, 0.1), Complex64::new(-0.1, 0.3)]),
        );
        let cost = two_layer_cost(a, x);
        cost.gradient(&mut set).unwrap();
        let analytic = set.grad(x)[0];

        let h = 1e-6;
        let mut plus = set.clone();
        plus.values_mut(x)[0] += Complex64::new(h, 0.0);
        let mut minus = set.clone();
        minus.values_mut(x)[0] -= Complex64::new(h, 0.0);
        let numeric = (cost.eval(&plus).unwrap().values[0] - cost.eval(&minus).unwrap().values[0])
            / Complex64::new(2.0 * h, 0.0);

        assert_relative_eq!(analytic.re, numeric.re, epsilon = 1e-6);
        assert_relative_eq!(analytic.im, numeric.im, epsilon = 1e-6);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut set = ParamSet::<f32>::new();
        let a = set.add("A", Tensor::zeros(3, 3));
        let x = set.add("x", Tensor::vector(vec![0.0; 4]));
        let err = Expr::mul(Expr::param(a), Expr::param(x)).eval(&set).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch(_)));
    }

    #[test]
    fn gradient_requires_scalar_output() {
        let mut set = ParamSet::<f32>::new();
        let x = set.add("x", Tensor::vector(vec![1.0, 2.0]));
        let err = Expr::softmax(Expr::param(x)).gradient(&mut set).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch(_)));
    }

    #[test]
    fn param_lookup_by_name() {
        let mut set = ParamSet::<f32>::new();
        let a = set.add("A", Tensor::identity(2));
        assert_eq!(set.by_name("A"), Some(a));
        assert_eq!(set.name(a), "A");
        assert_eq!(set.by_name("missing"), None);
        assert_eq!(set.len(), 1);
    }
}
