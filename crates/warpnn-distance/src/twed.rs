//! Time Warp Edit Distance.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::distance::Distance;
use crate::error::DistanceError;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// TWED with deletion penalty `lambda` and time stiffness `nu`.
///
/// Points are timestamped `1..=n` by position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twed {
    lambda: f64,
    nu: f64,
}

impl Twed {
    /// Create a TWED calculator.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidParameter`] | `lambda` or `nu` negative or not finite |
    pub fn new(lambda: f64, nu: f64) -> Result<Self, DistanceError> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(DistanceError::InvalidParameter {
                name: "lambda",
                value: lambda,
            });
        }
        if !nu.is_finite() || nu < 0.0 {
            return Err(DistanceError::InvalidParameter {
                name: "nu",
                value: nu,
            });
        }
        Ok(Self { lambda, nu })
    }

    /// Return the deletion penalty.
    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Return the time stiffness.
    #[must_use]
    pub fn nu(&self) -> f64 {
        self.nu
    }
}

/// Squared step into position `k` (1-based); the first point steps from zero.
fn step_cost(x: &[f64], k: usize) -> f64 {
    if k > 1 {
        (x[k - 1] - x[k - 2]).powi(2)
    } else {
        x[0].powi(2)
    }
}

impl ElasticDistance for Twed {
    #[instrument(level = "trace", skip(self, a, b))]
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        let (a, b) = (a.as_slice(), b.as_slice());
        let (n, m) = (a.len(), b.len());

        let step_b: Vec<f64> = (0..=m)
            .map(|j| if j == 0 { 0.0 } else { step_cost(b, j) })
            .collect();

        // Row 0: deleting every prefix of b.
        let mut prev = vec![0.0; m + 1];
        for j in 1..=m {
            prev[j] = prev[j - 1] + step_b[j];
        }
        let mut curr = vec![f64::INFINITY; m + 1];

        for i in 1..=n {
            let step_a = step_cost(a, i);
            curr[0] = prev[0] + step_a;
            let mut row_min = curr[0];

            for j in 1..=m {
                let both_past_first = i > 1 && j > 1;

                let mut local = (a[i - 1] - b[j - 1]).powi(2);
                let mut htrans = i.abs_diff(j) as f64;
                if both_past_first {
                    local += (a[i - 2] - b[j - 2]).powi(2);
                    htrans += i.abs_diff(j) as f64;
                }

                let mut best = (prev[j - 1] + self.nu * htrans) + local;
                let delete_a = ((step_a + prev[j]) + self.lambda) + self.nu;
                if best > delete_a {
                    best = delete_a;
                }
                let delete_b = ((step_b[j] + curr[j - 1]) + self.lambda) + self.nu;
                if best > delete_b {
                    best = delete_b;
                }

                curr[j] = best;
                row_min = row_min.min(best);
            }

            if row_min >= cutoff {
                return Distance::ABANDONED;
            }

            std::mem::swap(&mut prev, &mut curr);
        }

        let last = prev[m];
        if last >= cutoff {
            Distance::ABANDONED
        } else {
            Distance::new(last)
        }
    }

    fn name(&self) -> &'static str {
        "twed"
    }
}
