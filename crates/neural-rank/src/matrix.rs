//! Dense weighted adjacency matrices.
//!
//! Entry `(i, j)` is the weight of the directed edge `j -> i` ("column
//! points to row"). All entries are finite and non-negative; construction
//! validates this and [`AdjacencyMatrix::perturb`] preserves it.

use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::autodiff::Tensor;
use crate::error::ValidationError;
use crate::validation::validate_adjacency_values;

/// Dimension of the baseline graph.
pub const DEFAULT_SIZE: usize = 5;

/// Row-major weights of the baseline graph.
const BASELINE: [[f32; DEFAULT_SIZE]; DEFAULT_SIZE] = [
    [0.0, 0.0, 0.0, 0.0, 1.0],
    [0.5, 0.0, 0.0, 0.0, 0.0],
    [0.5, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.5, 0.0, 0.0],
    [0.0, 0.0, 0.5, 1.0, 0.0],
];

/// A directed weighted edge `source -> target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    /// Origin node (matrix column).
    pub source: usize,
    /// Destination node (matrix row).
    pub target: usize,
    /// Edge weight, `>= 0`.
    pub weight: f64,
}

/// Square matrix of non-negative `f32` edge weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacencyMatrix {
    size: usize,
    values: Vec<f32>,
}

impl AdjacencyMatrix {
    /// The fixed five-node example graph.
    pub fn baseline() -> Self {
        Self {
            size: DEFAULT_SIZE,
            values: BASELINE.iter().flatten().copied().collect(),
        }
    }

    /// All-zero `size x size` matrix.
    pub fn zeros(size: usize) -> Result<Self, ValidationError> {
        Self::from_flat(size, vec![0.0; size * size])
    }

    /// Build from row-major values.
    ///
    /// # Errors
    ///
    /// Wrong length, negative or non-finite entries, or a size outside the
    /// supported range.
    pub fn from_flat(size: usize, values: Vec<f32>) -> Result<Self, ValidationError> {
        validate_adjacency_values(size, &values)?;
        Ok(Self { size, values })
    }

    /// Build from rows. Every row must have as many entries as there are rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, ValidationError> {
        let size = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(ValidationError::DimensionMismatch(format!(
                "row {i} has {} entries, expected {size}",
                row.len()
            )));
        }
        Self::from_flat(size, rows.iter().flatten().copied().collect())
    }

    /// Number of nodes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major weights.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Weight of edge `col -> row`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.size + col]
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Number of nonzero entries.
    pub fn nnz(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }

    /// Randomly overwrite entries in place.
    ///
    /// For every entry, in row-major order, a fair coin is flipped; on heads
    /// the entry becomes `|z|` for a standard-normal draw `z`. Entries are
    /// never made negative. Repeated calls accumulate.
    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for v in &mut self.values {
            if rng.gen::<bool>() {
                let z: f64 = rng.sample(StandardNormal);
                *v = z.abs() as f32;
            }
        }
    }

    /// Directed edges for every nonzero entry, in row-major order.
    pub fn edges(&self) -> Vec<WeightedEdge> {
        let n = self.size;
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w != 0.0)
            .map(|(idx, &w)| WeightedEdge {
                source: idx % n,
                target: idx / n,
                weight: w as f64,
            })
            .collect()
    }

    /// The weights as an autodiff tensor.
    pub fn to_tensor(&self) -> Tensor<f32> {
        Tensor {
            values: self.values.clone(),
            width: self.size,
            height: self.size,
        }
    }

    /// Hermitian-style complex embedding.
    ///
    /// `C[i][j] = ((A[i][j] + A[j][i]) / 2) + i·((A[i][j] - A[j][i]) / 2)`
    pub fn complex_embedding(&self) -> Tensor<Complex64> {
        let n = self.size;
        let mut values = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let a = self.get(i, j) as f64;
                let b = self.get(j, i) as f64;
                values.push(Complex64::new((a + b) / 2.0, (a - b) / 2.0));
            }
        }
        Tensor {
            values,
            width: n,
            height: n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn baseline_edges_point_from_column_to_row() {
        let m = AdjacencyMatrix::baseline();
        assert_eq!(m.size(), 5);
        assert_eq!(m.nnz(), 7);
        let edges = m.edges();
        assert_eq!(
            edges[0],
            WeightedEdge {
                source: 4,
                target: 0,
                weight: 1.0
            }
        );
        assert!(edges.contains(&WeightedEdge {
            source: 2,
            target: 4,
            weight: 0.5
        }));
    }

    #[test]
    fn perturb_keeps_entries_non_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = AdjacencyMatrix::baseline();
        for _ in 0..200 {
            m.perturb(&mut rng);
            assert!(m.values().iter().all(|&v| v >= 0.0 && v.is_finite()));
        }
    }

    #[test]
    fn perturb_is_reproducible_for_a_seed() {
        let mut a = AdjacencyMatrix::baseline();
        let mut b = AdjacencyMatrix::baseline();
        a.perturb(&mut StdRng::seed_from_u64(3));
        b.perturb(&mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn complex_embedding_is_hermitian() {
        let m = AdjacencyMatrix::baseline();
        let c = m.complex_embedding();
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(c.values[i * 5 + j], c.values[j * 5 + i].conj());
            }
        }
        // A[1][0] = 0.5, A[0][1] = 0
        assert_eq!(c.values[5], Complex64::new(0.25, 0.25));
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = AdjacencyMatrix::from_rows(&[vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch(_)));
    }

    #[test]
    fn from_rows_rejects_negative_weight() {
        let err = AdjacencyMatrix::from_rows(&[vec![0.0, -1.0], vec![0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, ValidationError::NegativeWeight { row: 0, col: 1, .. }));
    }
}
