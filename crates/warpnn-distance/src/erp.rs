//! Edit distance with Real Penalty.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::constraint::BandConstraint;
use crate::distance::Distance;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// ERP: gaps are charged against the reference value `g`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Erp {
    constraint: BandConstraint,
    g: f64,
}

impl Erp {
    /// Create an ERP calculator with gap reference `g` and a band constraint.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `g` not finite |
    pub fn new(constraint: BandConstraint, g: f64) -> Result<Self, DistanceError> {
        if !g.is_finite() {
            return Err(DistanceError::InvalidParameter { name: "g", value: g });
        }
        Ok(Self { constraint, g })
    }

    /// Return the band constraint.
    #[must_use]
    pub fn constraint(&self) -> BandConstraint {
        self.constraint
    }

    /// Return the gap reference value.
    #[must_use]
    pub fn g(&self) -> f64 {
        self.g
    }
}

impl ElasticDistance for Erp {
    /// Rolling-row ERP. Deletion wins only when strictly cheaper than both
    /// alternatives, insertion likewise, otherwise the cells are matched.
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

        for i in 0..n {
            curr.fill(f64::INFINITY);
            let mut row_min = f64::INFINITY;
            let insert_gap = (a[i] - self.g).powi(2);

            for j in self.constraint.column_range(i, m) {
                let delete_gap = (self.g - b[j]).powi(2);
                let substitute = (a[i] - b[j]).powi(2);

                let val = if i == 0 && j == 0 {
                    0.0
                } else {
                    let diag = if i > 0 && j > 0 { prev[j - 1] } else { f64::INFINITY };
                    let left = if j > 0 { curr[j - 1] } else { f64::INFINITY };
                    let above = if i > 0 { prev[j] } else { f64::INFINITY };

                    let matched = diag + substitute;
                    let deleted = left + delete_gap;
                    let inserted = above + insert_gap;

                    if i == 0 || (j != 0 && matched > deleted && deleted < inserted) {
                        deleted
                    } else if j == 0 || (i != 0 && matched > inserted && inserted < deleted) {
                        inserted
                    } else {
                        matched
                    }
                };

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
        "erp"
    }
}
