//! Rank extraction and comparison.
//!
//! Score vectors become [`RankPermutation`]s by a stable descending sort, and
//! two permutations are compared with a dynamic-programming edit distance
//! that treats node indices as symbols.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::autodiff::Scalar;

/// Node indices ordered from highest to lowest score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankPermutation(Vec<usize>);

impl RankPermutation {
    /// Rank a score vector. See [`to_permutation`].
    pub fn from_scores<S: Scalar>(scores: &[S]) -> Self {
        to_permutation(scores)
    }

    /// The ordered node indices.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Number of ranked nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for an empty ranking.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if every index in `0..len` occurs exactly once.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        for &i in &self.0 {
            match seen.get_mut(i) {
                Some(s) if !*s => *s = true,
                _ => return false,
            }
        }
        true
    }

    /// Consume into the underlying indices.
    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

impl fmt::Display for RankPermutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (k, i) in self.0.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, "]")
    }
}

/// Order node indices by descending score.
///
/// Real scores compare by value, complex scores by magnitude. The sort is
/// stable, so ties keep their original index order. NaN ranks last.
pub fn to_permutation<S: Scalar>(scores: &[S]) -> RankPermutation {
    let mut indexed: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .map(|(i, s)| (i, sort_key(s.rank_key())))
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    RankPermutation(indexed.into_iter().map(|(i, _)| i).collect())
}

// Total order: NaN sinks to the bottom and -0.0 ties with 0.0.
fn sort_key(k: f64) -> f64 {
    if k.is_nan() {
        f64::NEG_INFINITY
    } else if k == 0.0 {
        0.0
    } else {
        k
    }
}

// ---------------------------------------------------------------------------
// Edit distance
// ---------------------------------------------------------------------------

/// Per-operation costs of [`edit_distance_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCosts {
    /// Cost of inserting a symbol.
    pub insertion: usize,
    /// Cost of deleting a symbol.
    pub deletion: usize,
    /// Cost of replacing a symbol with a different one.
    pub substitution: usize,
}

impl EditCosts {
    /// Every operation costs 1 (Levenshtein distance).
    pub const UNIT: Self = Self {
        insertion: 1,
        deletion: 1,
        substitution: 1,
    };
}

impl Default for EditCosts {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Minimum total cost of transforming `a` into `b`.
pub fn edit_distance_with<T: PartialEq>(a: &[T], b: &[T], costs: EditCosts) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).map(|j| j * costs.insertion).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        curr[0] = (i + 1) * costs.deletion;
        for (j, y) in b.iter().enumerate() {
            let substitute = prev[j] + if x == y { 0 } else { costs.substitution };
            let delete = prev[j + 1] + costs.deletion;
            let insert = curr[j] + costs.insertion;
            curr[j + 1] = substitute.min(delete).min(insert);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Unit-cost edit distance.
pub fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    edit_distance_with(a, b, EditCosts::UNIT)
}

/// Unit-cost edit distance between two rankings.
pub fn compare(p: &RankPermutation, q: &RankPermutation) -> usize {
    edit_distance(p.as_slice(), q.as_slice())
}
