//! Weighted DTW with a logistic penalty on warping distance.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::constraint::BandConstraint;
use crate::distance::Distance;
use crate::dtw::rolling_warp;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// Weighted DTW. Cell cost is `(a_i - b_j)² * w(|i - j|)`; unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wdtw {
    g: f64,
}

impl Wdtw {
    /// Create a WDTW calculator with logistic steepness `g`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `g` negative or not finite |
    pub fn new(g: f64) -> Result<Self, DistanceError> {
        if !g.is_finite() || g < 0.0 {
            return Err(DistanceError::InvalidParameter { name: "g", value: g });
        }
        Ok(Self { g })
    }

    /// Return the logistic steepness.
    #[must_use]
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Weight for every possible index offset `0..len`, centred on `len / 2`.
    fn weights(&self, len: usize) -> Vec<f64> {
        let half = len as f64 / 2.0;
        (0..len)
            .map(|d| 1.0 / (1.0 + (-self.g * (d as f64 - half)).exp()))
            .collect()
    }
}

impl ElasticDistance for Wdtw {
    #[instrument(level = "trace", skip(self, a, b))]
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        let (a, b) = (a.as_slice(), b.as_slice());
        let weights = self.weights(a.len().max(b.len()));
        let value = rolling_warp(
            a.len(),
            b.len(),
            BandConstraint::Unconstrained,
            cutoff,
            |i, j| (a[i] - b[j]).powi(2) * weights[i.abs_diff(j)],
        );
        Distance::new(value)
    }

    fn name(&self) -> &'static str {
        "wdtw"
    }
}
