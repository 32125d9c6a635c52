//! Single-use memo of pairwise distance results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use warpnn_distance::DistanceResult;

/// How a cache key is formed from an index pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKeying {
    /// `(a, b)` and `(b, a)` share one entry.
    Symmetric,
    /// `(a, b)` and `(b, a)` are distinct entries.
    Ordered,
}

/// A stored pair and its result, as captured in a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// First index of the key.
    pub a: usize,
    /// Second index of the key.
    pub b: usize,
    /// The stored result.
    pub result: DistanceResult,
}

/// Pairwise distance results, each readable exactly once via [`take`][Self::take].
///
/// Not synchronised; callers confine it to a single thread at a time.
#[derive(Debug, Clone)]
pub struct PairwiseDistanceCache {
    keying: CacheKeying,
    entries: HashMap<(usize, usize), DistanceResult>,
}

impl PairwiseDistanceCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(keying: CacheKeying) -> Self {
        Self {
            keying,
            entries: HashMap::new(),
        }
    }

    fn key(&self, a: usize, b: usize) -> (usize, usize) {
        match self.keying {
            CacheKeying::Symmetric if a > b => (b, a),
            _ => (a, b),
        }
    }

    /// Store a result, replacing any previous entry for the same key.
    pub fn put(&mut self, a: usize, b: usize, result: DistanceResult) {
        let key = self.key(a, b);
        self.entries.insert(key, result);
    }

    /// Read and remove the entry for `(a, b)`.
    pub fn take(&mut self, a: usize, b: usize) -> Option<DistanceResult> {
        let key = self.key(a, b);
        self.entries.remove(&key)
    }

    /// Read the entry for `(a, b)` without consuming it.
    #[must_use]
    pub fn peek(&self, a: usize, b: usize) -> Option<&DistanceResult> {
        self.entries.get(&self.key(a, b))
    }

    /// Drop the entry for `(a, b)`. Returns whether one existed.
    pub fn remove(&mut self, a: usize, b: usize) -> bool {
        self.take(a, b).is_some()
    }

    /// Return true if an entry exists for `(a, b)`.
    #[must_use]
    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.entries.contains_key(&self.key(a, b))
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the keying mode.
    #[must_use]
    pub fn keying(&self) -> CacheKeying {
        self.keying
    }

    /// Copy every entry out, sorted by key so the output is deterministic.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let mut out: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|(&(a, b), &result)| CacheEntry { a, b, result })
            .collect();
        out.sort_by_key(|e| (e.a, e.b));
        out
    }

    /// Rebuild a cache from snapshot entries.
    #[must_use]
    pub fn restore(keying: CacheKeying, entries: Vec<CacheEntry>) -> Self {
        let mut cache = Self::new(keying);
        for entry in entries {
            cache.put(entry.a, entry.b, entry.result);
        }
        cache
    }
}
