//! Output of a completed leave-one-out run.

use serde::{Deserialize, Serialize};

use crate::confusion::ConfusionMatrix;
use crate::error::LoocvError;
use crate::prediction::ClassDistribution;

/// Work counters accumulated across rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoocvStats {
    /// Kernel invocations.
    pub kernel_calls: u64,
    /// Distances served from the pairwise cache.
    pub cache_hits: u64,
    /// Kernel invocations that returned the abandoned sentinel.
    pub abandoned: u64,
    /// Unordered instance pairs compared at least once.
    pub distinct_pairs: u64,
}

/// The leave-one-out verdict for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePrediction {
    /// Dataset index.
    pub index: usize,
    /// Actual class.
    pub true_label: usize,
    /// Neighbour vote shares.
    pub distribution: ClassDistribution,
    /// Predicted class.
    pub predicted: usize,
    /// Nanoseconds attributed to this instance.
    pub elapsed_nanos: u64,
}

impl InstancePrediction {
    /// Return true when the prediction matches the actual class.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.predicted == self.true_label
    }
}

/// Every instance's prediction plus run timings and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoocvResults {
    /// One entry per instance, in dataset order.
    pub predictions: Vec<InstancePrediction>,
    /// Number of classes in the dataset.
    pub n_classes: usize,
    /// Setup nanoseconds.
    pub build_nanos: u64,
    /// Round and assembly nanoseconds.
    pub estimate_nanos: u64,
    /// Work counters.
    pub stats: LoocvStats,
}

impl LoocvResults {
    /// Proportion of instances predicted correctly.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.predictions.is_empty() {
            return 0.0;
        }
        let correct = self.predictions.iter().filter(|p| p.is_correct()).count();
        correct as f64 / self.predictions.len() as f64
    }

    /// Tabulate actual versus predicted classes.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::EmptyDataset`] when there are no predictions.
    pub fn confusion_matrix(&self) -> Result<ConfusionMatrix, LoocvError> {
        ConfusionMatrix::from_pairs(
            self.predictions.iter().map(|p| (p.true_label, p.predicted)),
            self.n_classes,
        )
    }
}
