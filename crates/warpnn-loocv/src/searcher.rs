//! Per-instance k-nearest-neighbour accumulator.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use warpnn_distance::{Distance, DistanceResult, ElasticDistance, Sequence, SequencePair};

use crate::error::LoocvError;
use crate::prediction::{ClassDistribution, Prediction};

/// A retained candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    /// Dataset index of the candidate.
    pub index: usize,
    /// Class label of the candidate.
    pub label: usize,
    /// Distance from the searcher's instance.
    pub distance: Distance,
}

/// Keeps the `k` nearest candidates seen so far for one held-out instance.
///
/// The distance of the k-th retained neighbour is the cutoff handed to the
/// kernel, so later candidates can be abandoned early. It never increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourSearcher {
    index: usize,
    label: usize,
    k: usize,
    neighbours: Vec<Neighbour>,
    seen: usize,
    time_nanos: u64,
}

impl NeighbourSearcher {
    /// Create an empty searcher for instance `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::InvalidNeighbourCount`] if `k` is zero.
    pub fn new(index: usize, label: usize, k: usize) -> Result<Self, LoocvError> {
        if k == 0 {
            return Err(LoocvError::InvalidNeighbourCount { k });
        }
        Ok(Self {
            index,
            label,
            k,
            neighbours: Vec::with_capacity(k + 1),
            seen: 0,
            time_nanos: 0,
        })
    }

    /// Distance a new candidate must beat, `+inf` while fewer than `k` are held.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        if self.neighbours.len() < self.k {
            f64::INFINITY
        } else {
            self.neighbours[self.k - 1].distance.value()
        }
    }

    /// Compute the distance from `target` (this searcher's instance) to a
    /// candidate under the current cutoff, and offer it.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::SelfComparison`] | `candidate_index` is this searcher's index |
    /// | [`LoocvError::MissingLabel`] | the candidate has no label |
    pub fn add<K>(
        &mut self,
        kernel: &K,
        target: &Sequence,
        candidate_index: usize,
        candidate: &Sequence,
    ) -> Result<DistanceResult, LoocvError>
    where
        K: ElasticDistance + ?Sized,
    {
        self.check_candidate(candidate_index)?;
        let label = candidate.label().ok_or(LoocvError::MissingLabel {
            index: candidate_index,
        })?;
        let pair = SequencePair::of(target, candidate);
        let result = kernel.timed_distance(pair.first, pair.second, self.cutoff());
        self.record(candidate_index, label, result.distance, result.compute_nanos);
        Ok(result)
    }

    /// Offer a distance computed elsewhere (a cache hit). No kernel call.
    ///
    /// Returns whether the candidate was retained.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::SelfComparison`] if `candidate_index` is this searcher's index.
    pub fn add_precomputed(
        &mut self,
        candidate_index: usize,
        candidate_label: usize,
        distance: Distance,
        nanos: u64,
    ) -> Result<bool, LoocvError> {
        self.check_candidate(candidate_index)?;
        Ok(self.record(candidate_index, candidate_label, distance, nanos))
    }

    fn check_candidate(&self, candidate_index: usize) -> Result<(), LoocvError> {
        if candidate_index == self.index {
            return Err(LoocvError::SelfComparison { index: self.index });
        }
        Ok(())
    }

    fn record(&mut self, index: usize, label: usize, distance: Distance, nanos: u64) -> bool {
        self.seen += 1;
        self.time_nanos = self.time_nanos.saturating_add(nanos);

        if distance.value() >= self.cutoff() {
            return false;
        }
        // First-seen wins ties: insert after every neighbour at or below this distance.
        let pos = self
            .neighbours
            .partition_point(|n| n.distance.value() <= distance.value());
        self.neighbours.insert(
            pos,
            Neighbour {
                index,
                label,
                distance,
            },
        );
        self.neighbours.truncate(self.k);
        true
    }

    /// Vote among the retained neighbours.
    ///
    /// The winning class has the most votes; ties go to the class of the
    /// nearest neighbour among the tied classes. With nothing retained the
    /// distribution is uniform.
    pub fn predict(&mut self, n_classes: usize) -> Prediction {
        let start = Instant::now();

        let (distribution, predicted) = if self.neighbours.is_empty() {
            let uniform = ClassDistribution::uniform(n_classes);
            let predicted = uniform.most_probable();
            (uniform, predicted)
        } else {
            let mut votes = vec![0usize; n_classes];
            for n in &self.neighbours {
                votes[n.label] += 1;
            }
            let best = votes.iter().copied().max().unwrap_or(0);
            let predicted = self
                .neighbours
                .iter()
                .find(|n| votes[n.label] == best)
                .map_or(0, |n| n.label);
            let total = self.neighbours.len() as f64;
            let probs = votes.iter().map(|&v| v as f64 / total).collect();
            (ClassDistribution::new(probs), predicted)
        };

        let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.time_nanos = self.time_nanos.saturating_add(nanos);

        Prediction {
            distribution,
            predicted,
            elapsed_nanos: self.time_nanos,
        }
    }

    /// Index of the held-out instance.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Class label of the held-out instance.
    #[must_use]
    pub fn label(&self) -> usize {
        self.label
    }

    /// Number of neighbours kept.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Retained neighbours, nearest first.
    #[must_use]
    pub fn neighbours(&self) -> &[Neighbour] {
        &self.neighbours
    }

    /// Number of candidates offered so far.
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Nanoseconds attributed to this searcher.
    #[must_use]
    pub fn time_nanos(&self) -> u64 {
        self.time_nanos
    }
}
