//! Incremental leave-one-out evaluation of k-nearest-neighbour classifiers.
//!
//! Every instance owns a [`NeighbourSearcher`]. Rounds reveal one instance to
//! all the others, sharing symmetric distances through a single-use
//! [`PairwiseDistanceCache`] and passing each searcher's k-th distance to the
//! kernel as an early-abandon cutoff. Runs pause between rounds on a time
//! budget, a neighbour limit, or cancellation, and can be checkpointed and
//! resumed.

mod cache;
mod checkpoint;
mod config;
mod confusion;
mod engine;
mod error;
mod prediction;
mod result;
mod searcher;
mod timer;

pub use cache::{CacheEntry, CacheKeying, PairwiseDistanceCache};
pub use checkpoint::{CHECKPOINT_FORMAT_VERSION, LoocvCheckpoint};
pub use config::{LoocvConfig, NeighbourOrder};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use engine::{EngineState, IncrementalLoocv, LoocvProgress, PauseReason};
pub use error::LoocvError;
pub use prediction::{ClassDistribution, Prediction};
pub use result::{InstancePrediction, LoocvResults, LoocvStats};
pub use searcher::{Neighbour, NeighbourSearcher};
pub use timer::{CancelToken, StopWatch, TimerState};
