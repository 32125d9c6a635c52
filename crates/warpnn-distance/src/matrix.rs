//! Lower-triangular matrix of pairwise distances for any symmetric kernel.

use rayon::prelude::*;
use tracing::instrument;

use crate::distance::Distance;
use crate::kernel::ElasticDistance;
use crate::series::TimeSeriesView;

/// Symmetric distance matrix stored as a lower-triangular flat vector.
///
/// For `n` series, stores `n*(n-1)/2` distances. Access is symmetric:
/// `get(i, j) == get(j, i)`. Diagonal is always zero.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<Distance>,
}

impl DistanceMatrix {
    /// Compute every unique pair with `kernel`, in parallel.
    ///
    /// The lower triangle is filled as `kernel(series[i], series[j])` with
    /// `i > j`; for asymmetric kernels this fixes which side plays `a`.
    #[must_use]
    #[instrument(skip(kernel, series), fields(kernel = kernel.name(), n = series.len()))]
    pub fn compute<K>(kernel: &K, series: &[TimeSeriesView<'_>]) -> Self
    where
        K: ElasticDistance + Sync,
    {
        let n = series.len();
        let total_pairs = n * n.saturating_sub(1) / 2;

        let data: Vec<Distance> = (0..total_pairs)
            .into_par_iter()
            .map(|flat_idx| {
                let (i, j) = unflatten(flat_idx);
                kernel.distance(series[i], series[j])
            })
            .collect();

        Self { n, data }
    }

    /// Return the number of series in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the distance between series `i` and series `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Distance {
        assert!(i < self.n, "row index {i} out of bounds for matrix of size {}", self.n);
        assert!(j < self.n, "column index {j} out of bounds for matrix of size {}", self.n);
        if i == j {
            return Distance::ZERO;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        self.data[row * (row - 1) / 2 + col]
    }

    /// Iterate over all unique pairs `(i, j, distance)` where `i > j`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Distance)> + '_ {
        (1..self.n).flat_map(move |i| (0..i).map(move |j| (i, j, self.data[i * (i - 1) / 2 + j])))
    }

    /// Index of the nearest other series to `i`, ties going to the lower index.
    #[must_use]
    pub fn nearest(&self, i: usize) -> Option<(usize, Distance)> {
        (0..self.n)
            .filter(|&j| j != i)
            .map(|j| (j, self.get(i, j)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
    }
}

// flat_idx = i*(i-1)/2 + j, i > j
fn unflatten(flat_idx: usize) -> (usize, usize) {
    let mut i = ((1.0 + (1.0 + 8.0 * flat_idx as f64).sqrt()) / 2.0).floor() as usize;
    // Guard against float rounding at triangle boundaries.
    while i * (i - 1) / 2 > flat_idx {
        i -= 1;
    }
    while (i + 1) * i / 2 <= flat_idx {
        i += 1;
    }
    (i, flat_idx - i * (i - 1) / 2)
}
