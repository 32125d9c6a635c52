//! Move-Split-Merge distance.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::distance::Distance;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// MSM with a constant split/merge cost `c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Msm {
    c: f64,
}

impl Msm {
    /// Create an MSM calculator with split/merge cost `c`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `c` negative or not finite |
    pub fn new(c: f64) -> Result<Self, DistanceError> {
        if !c.is_finite() || c < 0.0 {
            return Err(DistanceError::InvalidParameter { name: "c", value: c });
        }
        Ok(Self { c })
    }

    /// Return the split/merge cost.
    #[must_use]
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Cost of splitting or merging `new` next to `x` and `y`.
    ///
    /// Flat `c` when `new` lies between the neighbours, otherwise `c` plus the
    /// distance to the nearer one.
    fn split_merge(&self, new: f64, x: f64, y: f64) -> f64 {
        if (x <= new && new <= y) || (y <= new && new <= x) {
            self.c
        } else {
            self.c + (new - x).abs().min((new - y).abs())
        }
    }
}

impl ElasticDistance for Msm {
    #[instrument(level = "trace", skip(self, a, b))]
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        let (a, b) = (a.as_slice(), b.as_slice());
        let (n, m) = (a.len(), b.len());

        let mut prev = vec![f64::INFINITY; m];
        let mut curr = vec![f64::INFINITY; m];

        // First row: only split/merge moves along b.
        curr[0] = (a[0] - b[0]).abs();
        for j in 1..m {
            curr[j] = curr[j - 1] + self.split_merge(b[j], a[0], b[j - 1]);
        }
        if curr.iter().copied().fold(f64::INFINITY, f64::min) >= cutoff {
            return Distance::ABANDONED;
        }
        std::mem::swap(&mut prev, &mut curr);

        for i in 1..n {
            curr[0] = prev[0] + self.split_merge(a[i], a[i - 1], b[0]);
            let mut row_min = curr[0];

            for j in 1..m {
                let moved = prev[j - 1] + (a[i] - b[j]).abs();
                let split_a = prev[j] + self.split_merge(a[i], a[i - 1], b[j]);
                let split_b = curr[j - 1] + self.split_merge(b[j], a[i], b[j - 1]);
                let val = moved.min(split_a.min(split_b));
                curr[j] = val;
                row_min = row_min.min(val);
            }

            if row_min >= cutoff {
                return Distance::ABANDONED;
            }

            std::mem::swap(&mut prev, &mut curr);
        }

        let last = prev[m - 1];
        if last >= cutoff {
            Distance::ABANDONED
        } else {
            Distance::new(last)
        }
    }

    fn name(&self) -> &'static str {
        "msm"
    }
}
