//! Shared test helpers for the neural-rank integration test suite.
//!
//! Provides seeded random matrix and score generators, a dense reference
//! PageRank, and small floating-point utilities used across test modules.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use neural_rank::matrix::AdjacencyMatrix;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Random `n x n` adjacency matrix with roughly `density` nonzero entries,
/// each uniform in `(0, 1]`.
pub fn random_adjacency(n: usize, density: f64, seed: u64) -> AdjacencyMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..n * n)
        .map(|_| {
            if rng.gen::<f64>() < density {
                1.0 - rng.gen::<f32>()
            } else {
                0.0
            }
        })
        .collect();
    AdjacencyMatrix::from_flat(n, values).expect("generated matrix is valid")
}

/// Random real scores in `[-1, 1)`.
pub fn random_scores(n: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Random scores drawn from a handful of values so that ties are common.
pub fn tied_scores(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..3) as f64).collect()
}

/// Random complex scores.
pub fn random_complex_scores(n: usize, seed: u64) -> Vec<Complex64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}

// ---------------------------------------------------------------------------
// Reference implementations
// ---------------------------------------------------------------------------

/// Dense PageRank over the "column points to row" convention, iterated a
/// fixed number of times. Nodes with no incident edge rank 0.
pub fn dense_pagerank(matrix: &AdjacencyMatrix, damping: f64, sweeps: usize) -> Vec<f64> {
    let n = matrix.size();
    let w = |i: usize, j: usize| matrix.get(i, j) as f64;

    let outbound: Vec<f64> = (0..n).map(|j| (0..n).map(|i| w(i, j)).sum()).collect();
    let touched: Vec<bool> = (0..n)
        .map(|k| (0..n).any(|o| w(k, o) != 0.0 || w(o, k) != 0.0))
        .collect();
    let m = touched.iter().filter(|&&t| t).count();
    if m == 0 {
        return vec![0.0; n];
    }

    let mut rank: Vec<f64> = touched
        .iter()
        .map(|&t| if t { 1.0 / m as f64 } else { 0.0 })
        .collect();
    for _ in 0..sweeps {
        let leak: f64 = (0..n)
            .filter(|&j| touched[j] && outbound[j] == 0.0)
            .map(|j| damping * rank[j])
            .sum();
        rank = (0..n)
            .map(|i| {
                if !touched[i] {
                    return 0.0;
                }
                let inflow: f64 = (0..n)
                    .filter(|&j| outbound[j] > 0.0)
                    .map(|j| damping * rank[j] * w(i, j) / outbound[j])
                    .sum();
                inflow + (1.0 - damping) / m as f64 + leak / m as f64
            })
            .collect();
    }
    rank
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// L1 distance between two vectors.
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Count of consecutive pairs with `next <= prev`.
pub fn non_increasing_steps(values: &[f64]) -> usize {
    values.windows(2).filter(|w| w[1] <= w[0]).count()
}
