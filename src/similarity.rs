use phrase_vec::SparseVec;

use crate::errors::{FieldmapError, Result};

/// Pairwise cosine similarities, stored once per unordered pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    // row-major upper triangle without the diagonal
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn build(vectors: &[SparseVec]) -> Result<Self> {
        let n = vectors.len();
        if n < 2 {
            return Err(FieldmapError::InsufficientCorpus { size: n });
        }
        let norms: Vec<f64> = vectors.iter().map(|v| v.norm()).collect();
        let mut scores = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                scores.push(cosine(&vectors[i], norms[i], &vectors[j], norms[j]));
            }
        }
        Ok(Self { n, scores })
    }

    #[cfg(test)]
    pub(crate) fn from_condensed(n: usize, scores: Vec<f64>) -> Option<Self> {
        if n < 2 || scores.len() != n * (n - 1) / 2 {
            return None;
        }
        Some(Self { n, scores })
    }

    /// 0 on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.scores[self.offset(a, b)]
    }

    /// All `(i, j, score)` with `i < j`, in row order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |i| ((i + 1)..self.n).map(move |j| (i, j, self.get(i, j))))
    }

    fn offset(&self, a: usize, b: usize) -> usize {
        a * (2 * self.n - a - 1) / 2 + (b - a - 1)
    }
}

fn cosine(a: &SparseVec, norm_a: f64, b: &SparseVec, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (norm_a * norm_b)).clamp(0.0, 1.0)
}
