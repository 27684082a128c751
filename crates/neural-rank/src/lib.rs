//! Nonlinear fixed-point node ranking measured against PageRank.
//!
//! This crate ranks the nodes of a small weighted directed graph in two
//! ways and measures how far the orders disagree:
//!
//! * a linear baseline, PageRank by power iteration;
//! * a gradient-trained fixed point of "propagate through `A` twice with a
//!   softmax after each step", in real (`f32`) and complex (`Complex<f64>`)
//!   arithmetic.
//!
//! Disagreement is the edit distance between rank permutations. A Monte
//! Carlo campaign repeats the comparison while edge weights are randomly
//! perturbed.
//!
//! # Solvers
//!
//! | Solver | Scalar | Method |
//! |--------|--------|--------|
//! | [`PageRankSolver`](pagerank::PageRankSolver) | `f64` | Damped power iteration |
//! | [`RealRankSolver`](real::RealRankSolver) | `f32` | Momentum fixed-point search |
//! | [`ComplexRankSolver`](complex::ComplexRankSolver) | `Complex<f64>` | Same search over a Hermitian-style embedding |
//! | [`SelfConsistencySolver`](truth::SelfConsistencySolver) | `f32` | Trains `A` toward `A·Aᵀ ≈ I` |
//!
//! # Example
//!
//! ```rust
//! use neural_rank::matrix::AdjacencyMatrix;
//! use neural_rank::pagerank::PageRankSolver;
//! use neural_rank::rank::{compare, RankPermutation};
//! use neural_rank::real::RealRankSolver;
//! use neural_rank::traits::{LinearRankSolver, NonlinearRankSolver};
//!
//! let matrix = AdjacencyMatrix::baseline();
//! let baseline = RankPermutation::from_scores(&PageRankSolver::default().rank(&matrix).unwrap());
//! let solution = RealRankSolver::default().solve(&matrix).unwrap();
//! let fixed = RankPermutation::from_scores(&solution.scores);
//! assert!(compare(&baseline, &fixed) <= 5);
//! ```

pub mod autodiff;
pub mod complex;
pub mod config;
pub mod error;
pub mod fixed_point;
pub mod matrix;
pub mod pagerank;
pub mod rank;
pub mod real;
pub mod traits;
pub mod trial;
pub mod truth;
pub mod types;
pub mod validation;

pub use config::{ExperimentConfig, FixedPointParams, Mode, PageRankParams};
pub use error::{SolverError, ValidationError};
pub use matrix::AdjacencyMatrix;
pub use rank::{compare, to_permutation, RankPermutation};
pub use traits::{LinearRankSolver, NonlinearRankSolver};
pub use trial::{ExperimentReport, TrialDriver};
pub use types::{Algorithm, FixedPointSolution, GradientNorm};
