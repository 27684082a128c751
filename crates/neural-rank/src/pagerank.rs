//! PageRank via power iteration, the linear baseline ranking.
//!
//! Only nodes touched by at least one edge participate; the rest rank 0.
//! With `n` participating nodes and damping `α`, each sweep computes
//!
//! ```text
//! leak   = α · Σ old[d]                       over dangling nodes d
//! new[t] = Σ α · old[s] · w(s, t) + (1 − α)/n + leak/n
//! ```
//!
//! where outbound weights are normalized per source, starting from
//! `old = 1/n`. Iteration stops once the L1 change between sweeps is at most
//! the tolerance. Scores of participating nodes sum to 1.

use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::config::PageRankParams;
use crate::error::SolverError;
use crate::matrix::{AdjacencyMatrix, WeightedEdge};
use crate::traits::LinearRankSolver;
use crate::types::Algorithm;
use crate::validation::{validate_edges, validate_pagerank_params};

/// Power-iteration PageRank.
#[derive(Debug, Clone, Copy)]
pub struct PageRankSolver {
    /// Probability of following an edge.
    pub damping: f64,
    /// L1 change at or below which iteration stops.
    pub tolerance: f64,
    /// Sweeps allowed before giving up with [`SolverError::NonConvergence`].
    pub max_iterations: usize,
}

impl Default for PageRankSolver {
    fn default() -> Self {
        Self::from_params(&PageRankParams::default())
    }
}

impl PageRankSolver {
    /// Create a solver with explicit parameters.
    pub fn new(damping: f64, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            damping,
            tolerance,
            max_iterations,
        }
    }

    /// Create a solver from configuration.
    pub fn from_params(params: &PageRankParams) -> Self {
        Self::new(params.damping, params.tolerance, params.max_iterations)
    }

    fn params(&self) -> PageRankParams {
        PageRankParams {
            damping: self.damping,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }

    /// Rank the nodes of an edge list.
    ///
    /// Duplicate edges have their weights summed. Returns one
    /// `(node, rank)` pair for every node in `0..node_count`, in index order.
    ///
    /// # Errors
    ///
    /// - [`SolverError::InvalidInput`] for bad parameters, out-of-range
    ///   nodes, or negative / non-finite weights.
    /// - [`SolverError::NumericalInstability`] if a rank becomes non-finite.
    /// - [`SolverError::NonConvergence`] if `max_iterations` sweeps do not
    ///   bring the change within tolerance.
    #[instrument(skip(self, edges), fields(n = node_count, num_edges = edges.len()))]
    pub fn rank_edges(
        &self,
        node_count: usize,
        edges: &[WeightedEdge],
    ) -> Result<Vec<(usize, f64)>, SolverError> {
        validate_pagerank_params(&self.params())?;
        validate_edges(node_count, edges)?;
        let start = Instant::now();
        let alpha = self.damping;

        // Merge duplicate links and accumulate outbound weight.
        let mut links: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        let mut outbound = vec![0.0f64; node_count];
        let mut participating = vec![false; node_count];
        for e in edges {
            participating[e.source] = true;
            participating[e.target] = true;
            outbound[e.source] += e.weight;
            match links[e.source].iter_mut().find(|(t, _)| *t == e.target) {
                Some((_, w)) => *w += e.weight,
                None => links[e.source].push((e.target, e.weight)),
            }
        }
        for (source, targets) in links.iter_mut().enumerate() {
            if outbound[source] > 0.0 {
                for (_, w) in targets.iter_mut() {
                    *w /= outbound[source];
                }
            }
        }

        let n = participating.iter().filter(|&&p| p).count();
        if n == 0 {
            return Ok((0..node_count).map(|i| (i, 0.0)).collect());
        }
        let inverse = 1.0 / n as f64;

        let mut rank: Vec<f64> = participating
            .iter()
            .map(|&p| if p { inverse } else { 0.0 })
            .collect();
        let mut next = vec![0.0f64; node_count];
        let mut delta = f64::INFINITY;
        let mut sweeps = 0;

        while delta > self.tolerance {
            if sweeps >= self.max_iterations {
                warn!(sweeps, delta, tolerance = self.tolerance, "pagerank did not converge");
                return Err(SolverError::NonConvergence {
                    algorithm: Algorithm::PageRank,
                    iterations: sweeps,
                    residual: delta,
                    tolerance: self.tolerance,
                });
            }

            let leak = alpha
                * (0..node_count)
                    .filter(|&i| participating[i] && outbound[i] == 0.0)
                    .map(|i| rank[i])
                    .sum::<f64>();

            next.iter_mut().for_each(|v| *v = 0.0);
            for (source, targets) in links.iter().enumerate() {
                for &(target, w) in targets {
                    next[target] += alpha * rank[source] * w;
                }
            }
            let teleport = (1.0 - alpha) * inverse + leak * inverse;
            for (v, &p) in next.iter_mut().zip(&participating) {
                if p {
                    *v += teleport;
                }
            }

            delta = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            if !delta.is_finite() {
                return Err(SolverError::NumericalInstability {
                    algorithm: Algorithm::PageRank,
                    iteration: sweeps,
                    detail: "rank vector became non-finite".into(),
                });
            }
            std::mem::swap(&mut rank, &mut next);
            sweeps += 1;
            debug!(sweep = sweeps, delta, "pagerank sweep");
        }

        debug!(
            sweeps,
            nodes = n,
            elapsed_us = start.elapsed().as_micros() as u64,
            "pagerank converged"
        );
        Ok(rank.into_iter().enumerate().collect())
    }
}

impl LinearRankSolver for PageRankSolver {
    fn rank(&self, matrix: &AdjacencyMatrix) -> Result<Vec<f64>, SolverError> {
        let ranked = self.rank_edges(matrix.size(), &matrix.edges())?;
        Ok(ranked.into_iter().map(|(_, r)| r).collect())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::PageRank
    }
}
