//! Class distributions produced by neighbour votes.

use serde::{Deserialize, Serialize};

/// Class probability distribution from a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Create a new class distribution.
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Equal mass on every class.
    pub(crate) fn uniform(n_classes: usize) -> Self {
        let p = if n_classes == 0 { 0.0 } else { 1.0 / n_classes as f64 };
        Self::new(vec![p; n_classes])
    }

    /// Return the most probable class, ties going to the lowest index.
    #[must_use]
    pub fn most_probable(&self) -> usize {
        let mut best = 0;
        for (idx, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = idx;
            }
        }
        best
    }

    /// Return the top-k classes sorted by descending probability.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    /// Number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.probs.len()
    }
}

/// Outcome of a single searcher's vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Normalised vote shares.
    pub distribution: ClassDistribution,
    /// Winning class after tie-breaking by nearest neighbour.
    pub predicted: usize,
    /// Total nanoseconds attributed to this instance, prediction included.
    pub elapsed_nanos: u64,
}
