use std::path::PathBuf;

use warpnn_distance::DistanceError;

/// Errors from leave-one-out evaluation.
#[derive(Debug, thiserror::Error)]
pub enum LoocvError {
    /// Returned when a kernel or series fails validation.
    #[error(transparent)]
    Distance(#[from] DistanceError),

    /// Returned when the dataset has zero instances.
    #[error("dataset has zero instances")]
    EmptyDataset,

    /// Returned when an instance carries no class label.
    #[error("instance {index} has no class label")]
    MissingLabel {
        /// Zero-based index of the unlabelled instance.
        index: usize,
    },

    /// Returned when the neighbour count is zero.
    #[error("neighbour count k must be at least 1, got {k}")]
    InvalidNeighbourCount {
        /// The rejected k.
        k: usize,
    },

    /// Returned when an instance is offered to its own searcher.
    #[error("instance {index} cannot be its own neighbour")]
    SelfComparison {
        /// Index of the instance.
        index: usize,
    },

    /// Returned when a verified cache hit disagrees with a fresh computation.
    #[error("cached distance for ({a}, {b}) is {cached}, recomputed {fresh}")]
    CacheInconsistent {
        /// Searcher side of the pair.
        a: usize,
        /// Candidate side of the pair.
        b: usize,
        /// Value read from the cache.
        cached: f64,
        /// Value from the recomputation.
        fresh: f64,
    },

    /// Returned when results are requested before enough instances were processed.
    #[error("only {processed} of {expected} instances were processed")]
    IncompleteRun {
        /// Instances processed so far.
        processed: usize,
        /// Instances required by the current limits.
        expected: usize,
    },

    /// Returned when enabling a stopwatch that is already running.
    #[error("{timer} timer is already enabled")]
    TimerAlreadyEnabled {
        /// Name of the stopwatch.
        timer: &'static str,
    },

    /// Returned when disabling a stopwatch that is not running.
    #[error("{timer} timer is already disabled")]
    TimerAlreadyDisabled {
        /// Name of the stopwatch.
        timer: &'static str,
    },

    /// Returned when a checkpoint does not belong to the given dataset or kernel.
    #[error("checkpoint does not match this run: {reason}")]
    CheckpointMismatch {
        /// Which property disagreed.
        reason: String,
    },

    /// Returned when advancing a run that has already finished.
    #[error("evaluation has already finished")]
    AlreadyFinished,

    /// Returned when checkpoint serialization fails.
    #[error("failed to serialize checkpoint")]
    SerializeCheckpoint {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when checkpoint deserialization fails.
    #[error("failed to deserialize checkpoint")]
    DeserializeCheckpoint {
        /// Path of the checkpoint file, when loaded from disk.
        path: Option<PathBuf>,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the checkpoint file fails.
    #[error("failed to write checkpoint to {path}")]
    WriteCheckpoint {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the checkpoint file fails.
    #[error("failed to read checkpoint from {path}")]
    ReadCheckpoint {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a checkpoint has an incompatible format version.
    #[error("incompatible checkpoint version: expected {expected}, found {found}")]
    IncompatibleCheckpointVersion {
        /// The format version this build expects.
        expected: u32,
        /// The format version found in the checkpoint.
        found: u32,
    },
}
