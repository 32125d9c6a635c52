//! The elastic distance contract and the closed set of kernels implementing it.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::distance::{Distance, DistanceResult};
use crate::dtw::Dtw;
use crate::erp::Erp;
use crate::lcss::Lcss;
use crate::msm::Msm;
use crate::preprocess::derivative;
use crate::series::{SequencePair, TimeSeriesView};
use crate::twed::Twed;
use crate::wdtw::Wdtw;

/// A bounded elastic distance between two series.
///
/// For any finite `cutoff`, [`distance_with_cutoff`][Self::distance_with_cutoff]
/// returns the exact unbounded distance when it is below `cutoff` and
/// [`Distance::ABANDONED`] otherwise.
pub trait ElasticDistance {
    /// Compute the distance, abandoning as soon as it provably reaches `cutoff`.
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance;

    /// Short lowercase identifier, e.g. `"dtw"`.
    fn name(&self) -> &'static str;

    /// Whether `d(a, b) == d(b, a)` for all inputs.
    fn is_symmetric(&self) -> bool {
        true
    }

    /// Compute the unbounded distance.
    fn distance(&self, a: TimeSeriesView<'_>, b: TimeSeriesView<'_>) -> Distance {
        self.distance_with_cutoff(a, b, f64::INFINITY)
    }

    /// Compute the distance of a pair, with `first` in the role of `a`.
    fn pair_distance(&self, pair: SequencePair<'_>, cutoff: f64) -> Distance {
        self.distance_with_cutoff(pair.first, pair.second, cutoff)
    }

    /// Compute the distance and measure the wall time it took.
    fn timed_distance(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> DistanceResult {
        let start = Instant::now();
        let distance = self.distance_with_cutoff(a, b, cutoff);
        let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        DistanceResult::new(distance, nanos)
    }
}

/// Every supported kernel, plus the derivative decorator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElasticKernel {
    /// Dynamic time warping.
    Dtw(Dtw),
    /// Weighted dynamic time warping.
    Wdtw(Wdtw),
    /// Edit distance with real penalty.
    Erp(Erp),
    /// Longest common subsequence.
    Lcss(Lcss),
    /// Move-split-merge.
    Msm(Msm),
    /// Time warp edit distance.
    Twed(Twed),
    /// Apply the inner kernel to the derivatives of both series.
    Derivative(Box<ElasticKernel>),
}

impl ElasticKernel {
    /// Wrap `inner` so it operates on derivative series (e.g. DDTW from DTW).
    #[must_use]
    pub fn derivative(inner: ElasticKernel) -> Self {
        Self::Derivative(Box::new(inner))
    }

    /// Stable textual identity of the kernel and all of its parameters.
    ///
    /// Two kernels with equal fingerprints produce identical distances.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!("{self:?}")
    }
}

impl ElasticDistance for ElasticKernel {
    fn distance_with_cutoff(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        cutoff: f64,
    ) -> Distance {
        match self {
            Self::Dtw(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Wdtw(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Erp(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Lcss(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Msm(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Twed(k) => k.distance_with_cutoff(a, b, cutoff),
            Self::Derivative(inner) => {
                let da = derivative(a);
                let db = derivative(b);
                inner.distance_with_cutoff(da.as_view(), db.as_view(), cutoff)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Dtw(k) => k.name(),
            Self::Wdtw(k) => k.name(),
            Self::Erp(k) => k.name(),
            Self::Lcss(k) => k.name(),
            Self::Msm(k) => k.name(),
            Self::Twed(k) => k.name(),
            Self::Derivative(inner) => match inner.as_ref() {
                Self::Dtw(_) => "ddtw",
                Self::Wdtw(_) => "wddtw",
                _ => "derivative",
            },
        }
    }

    fn is_symmetric(&self) -> bool {
        match self {
            Self::Dtw(k) => k.is_symmetric(),
            Self::Wdtw(k) => k.is_symmetric(),
            Self::Erp(k) => k.is_symmetric(),
            Self::Lcss(k) => k.is_symmetric(),
            Self::Msm(k) => k.is_symmetric(),
            Self::Twed(k) => k.is_symmetric(),
            Self::Derivative(inner) => inner.is_symmetric(),
        }
    }
}

impl From<Dtw> for ElasticKernel {
    fn from(k: Dtw) -> Self {
        Self::Dtw(k)
    }
}

impl From<Wdtw> for ElasticKernel {
    fn from(k: Wdtw) -> Self {
        Self::Wdtw(k)
    }
}

impl From<Erp> for ElasticKernel {
    fn from(k: Erp) -> Self {
        Self::Erp(k)
    }
}

impl From<Lcss> for ElasticKernel {
    fn from(k: Lcss) -> Self {
        Self::Lcss(k)
    }
}

impl From<Msm> for ElasticKernel {
    fn from(k: Msm) -> Self {
        Self::Msm(k)
    }
}

impl From<Twed> for ElasticKernel {
    fn from(k: Twed) -> Self {
        Self::Twed(k)
    }
}
