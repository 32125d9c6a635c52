//! Longest common subsequence distance with a matching tolerance.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::constraint::BandConstraint;
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// LCSS: `1 - matches / |A|`, where two points match when `|a_i - b_j| <= epsilon`.
///
/// Normalised by the length of the first series, so it is not symmetric when
/// the lengths differ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lcss {
    constraint: BandConstraint,
    epsilon: f64,
}

impl Lcss {
    /// Create an LCSS calculator with matching tolerance `epsilon`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `epsilon` negative or not finite |
    pub fn new(constraint: BandConstraint, epsilon: f64) -> Result<Self, DistanceError> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(DistanceError::InvalidParameter {
                name: "epsilon",
                value: epsilon,
            });
        }
        Ok(Self {
            constraint,
            epsilon,
        })
    }

    /// Return the band constraint (`delta`).
    #[must_use]
    pub fn constraint(&self) -> BandConstraint {
        self.constraint
    }

    /// Return the matching tolerance.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ElasticDistance for Lcss {
    /// Rolling-row match counting. Cells outside the band hold zero matches.
    ///
    /// After row `i` at most `n - 1 - i` further matches can be added, so the
    /// pair is abandoned once even that optimistic count cannot bring the
    /// distance under `cutoff`.
    #[instrument(level = "trace", skip(self, a, b))]
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        let (a, b) = (a.as_slice(), b.as_slice());
        let (n, m) = (a.len(), b.len());
        let len = n as f64;

        // Slot 0 is the empty-prefix column; column j lives in slot j + 1.
        let mut prev = vec![0usize; m + 1];
        let mut curr = vec![0usize; m + 1];

        for i in 0..n {
            curr.fill(0);
            for j in self.constraint.column_range(i, m) {
                curr[j + 1] = if b[j] + self.epsilon >= a[i] && b[j] - self.epsilon <= a[i] {
                    prev[j] + 1
                } else {
                    curr[j].max(prev[j]).max(prev[j + 1])
                };
            }

            let row_max = curr.iter().copied().max().unwrap_or(0);
            let attainable = (row_max + (n - 1 - i)).min(n);
            if 1.0 - attainable as f64 / len >= cutoff {
                return Distance::ABANDONED;
            }

            std::mem::swap(&mut prev, &mut curr);
        }

        let matches = prev.iter().copied().max().unwrap_or(0);
        let value = 1.0 - matches as f64 / len;
        if value >= cutoff {
            Distance::ABANDONED
        } else {
            Distance::new(value)
        }
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "lcss"
    }
}
