//! Resumable snapshots of a leave-one-out run, encoded with bincode.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cache::{CacheEntry, CacheKeying};
use crate::engine::LoocvProgress;
use crate::error::LoocvError;
use crate::searcher::NeighbourSearcher;

/// Current binary format version.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Everything needed to continue a paused run on the same data.
///
/// Produced by [`IncrementalLoocv::checkpoint`][crate::IncrementalLoocv::checkpoint]
/// and consumed by [`IncrementalLoocv::resume`][crate::IncrementalLoocv::resume].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoocvCheckpoint {
    /// Format version for compatibility checking.
    pub format_version: u32,
    /// Kernel identity, including parameters.
    pub kernel_fingerprint: String,
    /// Dataset size at the time of the snapshot.
    pub n_instances: usize,
    /// Neighbour count.
    pub k: usize,
    /// Visiting order, cursor, and counters.
    pub progress: LoocvProgress,
    /// Per-instance searchers, empty if the run had not started.
    pub searchers: Vec<NeighbourSearcher>,
    /// Key scheme of the cache.
    pub cache_keying: CacheKeying,
    /// Cached pair results; `None` when dropped to save space.
    pub cache: Option<Vec<CacheEntry>>,
    /// Setup nanoseconds accumulated so far.
    pub train_nanos: u64,
    /// Round nanoseconds accumulated so far.
    pub estimate_nanos: u64,
}

impl LoocvCheckpoint {
    /// Drop the cached pairs.
    ///
    /// A resumed run then recomputes those pairs; predictions are unchanged.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Number of cached pairs carried by this snapshot.
    #[must_use]
    pub fn cached_pairs(&self) -> usize {
        self.cache.as_ref().map_or(0, Vec::len)
    }

    /// Encode to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::SerializeCheckpoint`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LoocvError> {
        bincode::serialize(self).map_err(|e| LoocvError::SerializeCheckpoint { source: e })
    }

    /// Decode from bytes produced by [`to_bytes`][Self::to_bytes].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::DeserializeCheckpoint`] | bincode decoding failed |
    /// | [`LoocvError::IncompatibleCheckpointVersion`] | format version mismatch |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoocvError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| LoocvError::DeserializeCheckpoint { path: None, source: e })?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), LoocvError> {
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(LoocvError::IncompatibleCheckpointVersion {
                expected: CHECKPOINT_FORMAT_VERSION,
                found: self.format_version,
            });
        }
        Ok(())
    }

    /// Save the checkpoint to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::SerializeCheckpoint`] | bincode encoding failed |
    /// | [`LoocvError::WriteCheckpoint`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoocvError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        std::fs::write(path, &bytes).map_err(|e| LoocvError::WriteCheckpoint {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            processed = self.progress.cursor,
            cached = self.cached_pairs(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Load a checkpoint from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::ReadCheckpoint`] | file read failed |
    /// | [`LoocvError::DeserializeCheckpoint`] | bincode decoding failed |
    /// | [`LoocvError::IncompatibleCheckpointVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoocvError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| LoocvError::ReadCheckpoint {
            path: path.to_path_buf(),
            source: e,
        })?;

        let checkpoint: Self =
            bincode::deserialize(&bytes).map_err(|e| LoocvError::DeserializeCheckpoint {
                path: Some(path.to_path_buf()),
                source: e,
            })?;
        checkpoint.check_version()?;

        debug!(
            n_instances = checkpoint.n_instances,
            processed = checkpoint.progress.cursor,
            cached = checkpoint.cached_pairs(),
            "checkpoint loaded"
        );
        Ok(checkpoint)
    }
}
