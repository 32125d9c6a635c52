//! Elastic distance kernels with early abandoning.
//!
//! Pure math library, zero I/O. Provides DTW, weighted DTW, ERP, LCSS, MSM and
//! TWED over validated time series, a derivative decorator, and pairwise
//! distance matrices. Every kernel accepts a cutoff and returns
//! [`Distance::ABANDONED`] once the result provably reaches it.

mod constraint;
mod distance;
mod dtw;
mod erp;
mod error;
mod kernel;
mod lcss;
mod matrix;
mod msm;
mod preprocess;
mod series;
mod twed;
mod wdtw;

pub use constraint::BandConstraint;
pub use distance::{Distance, DistanceResult};
pub use dtw::Dtw;
pub use erp::Erp;
pub use error::DistanceError;
pub use kernel::{ElasticDistance, ElasticKernel};
pub use lcss::Lcss;
pub use matrix::DistanceMatrix;
pub use msm::Msm;
pub use preprocess::derivative;
pub use series::{Sequence, SequencePair, TimeSeries, TimeSeriesView};
pub use twed::Twed;
pub use wdtw::Wdtw;
