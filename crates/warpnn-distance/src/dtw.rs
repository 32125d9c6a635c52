//! DTW distance computation.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::constraint::BandConstraint;
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// Immutable DTW configuration. Thread-safe and copyable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dtw {
    constraint: BandConstraint,
}

impl Dtw {
    /// Create an unconstrained DTW calculator.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self {
            constraint: BandConstraint::Unconstrained,
        }
    }

    /// Create a DTW calculator with a Sakoe-Chiba band constraint.
    #[must_use]
    pub fn with_sakoe_chiba(radius: usize) -> Self {
        Self {
            constraint: BandConstraint::SakoeChibaRadius(radius),
        }
    }

    /// Create a DTW calculator whose band is a fraction of the series length.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidWindow`] | `fraction` outside `[0, 1]` or not finite |
    pub fn with_window(fraction: f64, len: usize) -> Result<Self, DistanceError> {
        Ok(Self {
            constraint: BandConstraint::from_fraction(fraction, len)?,
        })
    }

    /// Create a DTW calculator from an existing [`BandConstraint`].
    #[must_use]
    pub fn from_constraint(constraint: BandConstraint) -> Self {
        Self { constraint }
    }

    /// Return the band constraint configuration.
    #[must_use]
    pub fn constraint(&self) -> BandConstraint {
        self.constraint
    }
}

impl Default for Dtw {
    fn default() -> Self {
        Self::unconstrained()
    }
}

impl ElasticDistance for Dtw {
    /// Rolling-row DTW over squared point differences. No square root is taken.
    ///
    /// Runs in O(n * bw) time and O(m) space, where `bw` is the band width.
    #[instrument(level = "trace", skip(self, a, b))]
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        let (a, b) = (a.as_slice(), b.as_slice());
        let value = rolling_warp(a.len(), b.len(), self.constraint, cutoff, |i, j| {
            (a[i] - b[j]).powi(2)
        });
        Distance::new(value)
    }

    fn name(&self) -> &'static str {
        "dtw"
    }
}

/// Rolling two-row warping recurrence shared by DTW and WDTW.
///
/// Each row buffer has `m + 1` slots. Slot 0 is a left sentinel (INF) and
/// column `j` lives in slot `j + 1`, so the three predecessors of `(i, j)` are
/// `prev[j]` (diagonal), `prev[j + 1]` (above) and `curr[j]` (left).
/// Out-of-band cells stay INF because each row is reset before it is filled.
///
/// Returns INF as soon as a whole row is `>= cutoff`, or when the final cell is.
pub(crate) fn rolling_warp(
    n: usize,
    m: usize,
    constraint: BandConstraint,
    cutoff: f64,
    cost: impl Fn(usize, usize) -> f64,
) -> f64 {
    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];

    for i in 0..n {
        curr.fill(f64::INFINITY);
        let mut row_min = f64::INFINITY;

        for j in constraint.column_range(i, m) {
            let best = if i == 0 && j == 0 {
                0.0
            } else {
                prev[j].min(prev[j + 1]).min(curr[j])
            };
            let val = cost(i, j) + best;
            curr[j + 1] = val;
            row_min = row_min.min(val);
        }

        // Every warping path crosses each row, so the row minimum bounds the result.
        if row_min >= cutoff {
            return f64::INFINITY;
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    // After the final swap, `prev` holds the last completed row.
    let last = prev[m];
    if last >= cutoff { f64::INFINITY } else { last }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;

    fn ts(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(values).unwrap()
    }

    #[test]
    fn self_distance_is_zero_for_any_band() {
        let a = ts(vec![3.0, -1.0, 4.0, 1.0]);
        for dtw in [Dtw::unconstrained(), Dtw::with_sakoe_chiba(0)] {
            assert_eq!(dtw.distance(a.as_view(), a.as_view()), Distance::ZERO);
        }
    }

    #[test]
    fn hand_computed_2x2() {
        // a=[0,1], b=[1,0]
        // C[0][0] = 1, C[0][1] = 1, C[1][0] = 1
        // C[1][1] = (1-0)² + min(1, 1, 1) = 2
        let dtw = Dtw::unconstrained();
        let a = ts(vec![0.0, 1.0]);
        let b = ts(vec![1.0, 0.0]);
        let dist = dtw.distance(a.as_view(), b.as_view());
        assert!((dist.value() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn single_bump_costs_one() {
        let dtw = Dtw::unconstrained();
        let a = ts(vec![1.0, 1.0, 1.0, 1.0]);
        let b = ts(vec![1.0, 1.0, 2.0, 1.0]);
        let dist = dtw.distance(a.as_view(), b.as_view());
        assert!((dist.value() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn single_bump_abandoned_below_cost() {
        // Every row minimum is 0 until the last, so only the final cell check fires.
        let dtw = Dtw::unconstrained();
        let a = ts(vec![1.0, 1.0, 1.0, 1.0]);
        let b = ts(vec![1.0, 1.0, 2.0, 1.0]);
        let dist = dtw.distance_with_cutoff(a.as_view(), b.as_view(), 0.5);
        assert!(dist.is_abandoned());
    }

    #[test]
    fn zero_radius_is_squared_euclidean() {
        let a = ts(vec![0.0, 2.0, 1.0]);
        let b = ts(vec![1.0, 0.0, 1.0]);
        let dist = Dtw::with_sakoe_chiba(0).distance(a.as_view(), b.as_view());
        assert!((dist.value() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn band_that_cannot_reach_end_is_infinite() {
        let dtw = Dtw::with_sakoe_chiba(1);
        let a = ts(vec![0.0; 6]);
        let b = ts(vec![0.0, 0.0]);
        assert!(dtw.distance(a.as_view(), b.as_view()).is_abandoned());
    }

    #[test]
    fn unequal_lengths_unconstrained() {
        // b is longer than a; every column is reachable.
        let dtw = Dtw::unconstrained();
        let a = ts(vec![0.0, 1.0]);
        let b = ts(vec![0.0, 0.0, 0.0, 1.0]);
        let dist = dtw.distance(a.as_view(), b.as_view());
        assert!((dist.value() - 0.0).abs() < 1e-10);
    }

    #[test]
    fn first_row_over_cutoff_stops_early() {
        // Row 0 already costs 100 in every column.
        let a = ts(vec![10.0, 0.0, 0.0]);
        let b = ts(vec![0.0, 0.0, 0.0]);
        let pruned = Dtw::unconstrained().distance_with_cutoff(a.as_view(), b.as_view(), 50.0);
        assert_eq!(pruned, Distance::ABANDONED);
    }

    #[test]
    fn banded_cutoff_keeps_values_strictly_below() {
        let dtw = Dtw::with_sakoe_chiba(1);
        let a = ts(vec![0.0, 1.0, 3.0, 2.0]);
        let b = ts(vec![1.0, 0.0, 2.0, 2.0]);
        let exact = dtw.distance(a.as_view(), b.as_view()).value();

        let kept = dtw.distance_with_cutoff(a.as_view(), b.as_view(), exact * 1.5 + 0.1);
        assert!((kept.value() - exact).abs() < 1e-10, "expected {exact}, got {kept}");
        assert!(dtw.distance_with_cutoff(a.as_view(), b.as_view(), exact).is_abandoned());
    }

    #[test]
    fn window_fraction_builds_radius() {
        let dtw = Dtw::with_window(0.25, 8).unwrap();
        assert_eq!(dtw.constraint(), BandConstraint::SakoeChibaRadius(2));
        assert!(Dtw::with_window(-0.1, 8).is_err());
    }
}
