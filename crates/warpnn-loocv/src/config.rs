//! Configuration builder for leave-one-out evaluation.

use std::time::Duration;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::LoocvError;

/// Order in which instances are revealed to the other searchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighbourOrder {
    /// Dataset order.
    Linear,
    /// A seeded permutation of the dataset.
    Shuffled {
        /// Seed for the permutation.
        seed: u64,
    },
}

impl NeighbourOrder {
    /// Materialise the visiting order for `n` instances.
    #[must_use]
    pub fn sequence(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        if let Self::Shuffled { seed } = *self {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }
        order
    }
}

/// Configuration for an incremental leave-one-out run.
///
/// Construct via [`LoocvConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default   |
/// |---------------------|-----------|
/// | `neighbour_limit`   | `None`    |
/// | `train_time_limit`  | `None`    |
/// | `order`             | `Linear`  |
/// | `verify_cache_hits` | `false`   |
#[derive(Debug, Clone, PartialEq)]
pub struct LoocvConfig {
    pub(crate) k: usize,
    pub(crate) neighbour_limit: Option<usize>,
    pub(crate) train_time_limit: Option<Duration>,
    pub(crate) order: NeighbourOrder,
    pub(crate) verify_cache_hits: bool,
}

impl LoocvConfig {
    /// Create a new config voting over `k` neighbours.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::InvalidNeighbourCount`] if `k` is zero.
    pub fn new(k: usize) -> Result<Self, LoocvError> {
        if k == 0 {
            return Err(LoocvError::InvalidNeighbourCount { k });
        }
        Ok(Self {
            k,
            neighbour_limit: None,
            train_time_limit: None,
            order: NeighbourOrder::Linear,
            verify_cache_hits: false,
        })
    }

    // --- Setters ---

    /// Stop after this many instances have been revealed. `None` means all.
    #[must_use]
    pub fn with_neighbour_limit(mut self, limit: Option<usize>) -> Self {
        self.neighbour_limit = limit;
        self
    }

    /// Pause once the estimated next round would cross this much estimate time.
    #[must_use]
    pub fn with_train_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.train_time_limit = limit;
        self
    }

    /// Set the instance visiting order.
    #[must_use]
    pub fn with_order(mut self, order: NeighbourOrder) -> Self {
        self.order = order;
        self
    }

    /// Recompute every cache hit and fail on disagreement.
    #[must_use]
    pub fn with_verify_cache_hits(mut self, verify: bool) -> Self {
        self.verify_cache_hits = verify;
        self
    }

    // --- Getters ---

    /// Return the neighbour count.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Return the neighbour limit, if any.
    #[must_use]
    pub fn neighbour_limit(&self) -> Option<usize> {
        self.neighbour_limit
    }

    /// Return the time limit, if any.
    #[must_use]
    pub fn train_time_limit(&self) -> Option<Duration> {
        self.train_time_limit
    }

    /// Return the visiting order.
    #[must_use]
    pub fn order(&self) -> NeighbourOrder {
        self.order
    }

    /// Return whether cache hits are verified.
    #[must_use]
    pub fn verify_cache_hits(&self) -> bool {
        self.verify_cache_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_k() {
        assert!(matches!(
            LoocvConfig::new(0),
            Err(LoocvError::InvalidNeighbourCount { k: 0 })
        ));
    }

    #[test]
    fn builder_sets_fields() {
        let config = LoocvConfig::new(3)
            .unwrap()
            .with_neighbour_limit(Some(10))
            .with_train_time_limit(Some(Duration::from_secs(2)))
            .with_order(NeighbourOrder::Shuffled { seed: 7 })
            .with_verify_cache_hits(true);
        assert_eq!(config.k(), 3);
        assert_eq!(config.neighbour_limit(), Some(10));
        assert_eq!(config.train_time_limit(), Some(Duration::from_secs(2)));
        assert_eq!(config.order(), NeighbourOrder::Shuffled { seed: 7 });
        assert!(config.verify_cache_hits());
    }

    #[test]
    fn linear_order_is_identity() {
        assert_eq!(NeighbourOrder::Linear.sequence(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn shuffled_order_is_seeded_permutation() {
        let order = NeighbourOrder::Shuffled { seed: 42 };
        let a = order.sequence(20);
        let b = order.sequence(20);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());

        let other = NeighbourOrder::Shuffled { seed: 43 }.sequence(20);
        assert_ne!(a, other);
    }
}
