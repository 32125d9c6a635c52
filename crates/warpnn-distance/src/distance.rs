//! Distance newtype and timed kernel results.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-negative elastic distance, or `+inf` when the computation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Distance(f64);

impl Distance {
    /// Sentinel for an abandoned computation: the true value is at least the cutoff.
    pub const ABANDONED: Self = Self(f64::INFINITY);

    /// Zero distance.
    pub const ZERO: Self = Self(0.0);

    /// Wrap a raw distance value.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw distance value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Return true when this is the abandoned sentinel.
    #[must_use]
    pub fn is_abandoned(self) -> bool {
        self.0 == f64::INFINITY
    }

    /// Total ordering comparison using [`f64::total_cmp`].
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_abandoned() {
            write!(f, "abandoned")
        } else {
            write!(f, "{:.6}", self.0)
        }
    }
}

/// A distance together with the wall-clock cost of producing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    /// The computed (or abandoned) distance.
    pub distance: Distance,
    /// Nanoseconds spent computing it.
    pub compute_nanos: u64,
}

impl DistanceResult {
    /// Bundle a distance with its compute time.
    #[must_use]
    pub fn new(distance: Distance, compute_nanos: u64) -> Self {
        Self {
            distance,
            compute_nanos,
        }
    }
}
