//! Band constraint types shared by the banded kernels.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::DistanceError;

/// Constraint on which index pairs `(i, j)` may be aligned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandConstraint {
    /// No constraint; every cell of the cost matrix is legal.
    #[default]
    Unconstrained,

    /// Sakoe-Chiba band: cell (i,j) is valid only if |i - j| <= radius.
    SakoeChibaRadius(usize),
}

impl BandConstraint {
    /// Build a band from a window expressed as a fraction of the series length.
    ///
    /// The radius is `ceil(fraction * len)`. A fraction of `1.0` still yields a
    /// finite radius; use [`BandConstraint::Unconstrained`] for no band at all.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::InvalidWindow`] when `fraction` is negative,
    /// above one, or not finite.
    pub fn from_fraction(fraction: f64, len: usize) -> Result<Self, DistanceError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(DistanceError::InvalidWindow { fraction });
        }
        let radius = (fraction * len as f64).ceil() as usize;
        Ok(Self::SakoeChibaRadius(radius))
    }

    /// Return the valid column range for a given row in the cost matrix.
    ///
    /// For unconstrained, returns `0..n_cols`.
    /// For Sakoe-Chiba, returns the intersection of `[row - r, row + r]` with `[0, n_cols)`.
    /// The range may be empty when the band misses the matrix entirely.
    #[must_use]
    pub fn column_range(&self, row: usize, n_cols: usize) -> Range<usize> {
        match self {
            Self::Unconstrained => 0..n_cols,
            Self::SakoeChibaRadius(r) => {
                let start = row.saturating_sub(*r).min(n_cols);
                let end = (row + r + 1).min(n_cols);
                start..end
            }
        }
    }

    /// Return true when cell `(row, col)` lies inside the band.
    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        match self {
            Self::Unconstrained => true,
            Self::SakoeChibaRadius(r) => row.abs_diff(col) <= *r,
        }
    }
}
