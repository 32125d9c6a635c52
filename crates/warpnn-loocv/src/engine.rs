//! Round-driven, budget-aware leave-one-out engine.

use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use warpnn_distance::{DistanceResult, ElasticDistance, ElasticKernel, Sequence};

use crate::cache::{CacheKeying, PairwiseDistanceCache};
use crate::checkpoint::{CHECKPOINT_FORMAT_VERSION, LoocvCheckpoint};
use crate::config::LoocvConfig;
use crate::error::LoocvError;
use crate::result::{InstancePrediction, LoocvResults, LoocvStats};
use crate::searcher::NeighbourSearcher;
use crate::timer::{CancelToken, StopWatch};

/// Relative tolerance when verifying a cache hit against a recomputation.
const VERIFY_TOLERANCE: f64 = 1e-9;

/// Why a run stopped before exhausting the visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseReason {
    /// The next round was predicted to cross the time limit.
    TimeBudget,
    /// The configured number of instances has been revealed.
    NeighbourLimit,
    /// The cancel token was set.
    Cancelled,
}

/// Lifecycle of an [`IncrementalLoocv`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed; searchers not built yet.
    Idle,
    /// Ready to execute round `round`.
    Building {
        /// Rounds completed so far.
        round: usize,
    },
    /// Stopped at a round boundary; may continue once the budget allows.
    Paused(PauseReason),
    /// All instances revealed, or results requested; no further rounds.
    Finished,
}

/// Resumable progress through the visiting order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoocvProgress {
    /// Visiting order over instance indices.
    pub order: Vec<usize>,
    /// Position of the next instance to reveal.
    pub cursor: usize,
    /// Rounds completed.
    pub round: usize,
    /// Wall time of the most recent round.
    pub previous_round_nanos: u64,
    /// Work counters.
    pub stats: LoocvStats,
}

/// How one searcher resolved the revealed instance in a round.
enum Resolution {
    Cached,
    Computed(DistanceResult),
}

/// Incremental leave-one-out evaluation of a k-NN classifier.
///
/// Each round reveals one instance to every other instance's
/// [`NeighbourSearcher`]. Distances come from the single-use cache when the
/// pair was already computed from the other side, otherwise from the kernel
/// with the searcher's current cutoff. Budgets are checked between rounds.
pub struct IncrementalLoocv<'d> {
    data: &'d [Sequence],
    kernel: ElasticKernel,
    config: LoocvConfig,
    n_classes: usize,
    state: EngineState,
    searchers: Vec<NeighbourSearcher>,
    cache: PairwiseDistanceCache,
    progress: LoocvProgress,
    /// `rank[i]` is the position of instance `i` in the visiting order.
    rank: Vec<usize>,
    train_timer: StopWatch,
    estimate_timer: StopWatch,
    cancel: Option<CancelToken>,
    results: Option<LoocvResults>,
}

impl<'d> IncrementalLoocv<'d> {
    /// Prepare a run over `data`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::EmptyDataset`] | `data` is empty |
    /// | [`LoocvError::MissingLabel`] | an instance has no label |
    /// | [`LoocvError::InvalidNeighbourCount`] | `config.k` is zero |
    pub fn new(
        data: &'d [Sequence],
        kernel: ElasticKernel,
        config: LoocvConfig,
    ) -> Result<Self, LoocvError> {
        let n_classes = validate_dataset(data, &config)?;
        let keying = keying_for(&kernel);
        Ok(Self {
            data,
            kernel,
            config,
            n_classes,
            state: EngineState::Idle,
            searchers: Vec::new(),
            cache: PairwiseDistanceCache::new(keying),
            progress: LoocvProgress::default(),
            rank: Vec::new(),
            train_timer: StopWatch::new("train"),
            estimate_timer: StopWatch::new("estimate"),
            cancel: None,
            results: None,
        })
    }

    /// Continue a run from a checkpoint taken over the same data and kernel.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::CheckpointMismatch`] | kernel, instance count, `k` or searcher set differ, or the order is not a permutation |
    /// | any error from [`IncrementalLoocv::new`] | dataset or config invalid |
    #[instrument(skip_all, fields(n = data.len(), round = checkpoint.progress.round))]
    pub fn resume(
        data: &'d [Sequence],
        kernel: ElasticKernel,
        config: LoocvConfig,
        checkpoint: LoocvCheckpoint,
    ) -> Result<Self, LoocvError> {
        let mut engine = Self::new(data, kernel, config)?;

        if checkpoint.kernel_fingerprint != engine.kernel.fingerprint() {
            return Err(mismatch(format!(
                "kernel {} differs from {}",
                checkpoint.kernel_fingerprint,
                engine.kernel.fingerprint()
            )));
        }
        if checkpoint.n_instances != data.len() {
            return Err(mismatch(format!(
                "checkpoint has {} instances, dataset has {}",
                checkpoint.n_instances,
                data.len()
            )));
        }
        if checkpoint.k != engine.config.k {
            return Err(mismatch(format!(
                "checkpoint k = {}, config k = {}",
                checkpoint.k, engine.config.k
            )));
        }
        if checkpoint.cache_keying != engine.cache.keying() {
            return Err(mismatch(format!(
                "checkpoint cache keying {:?} differs from {:?}",
                checkpoint.cache_keying,
                engine.cache.keying()
            )));
        }
        let built = !checkpoint.searchers.is_empty();
        if built {
            check_progress(data, &checkpoint.progress)?;
            check_searchers(data, &checkpoint.searchers)?;
        }

        engine.train_timer = StopWatch::with_elapsed("train", checkpoint.train_nanos);
        engine.estimate_timer = StopWatch::with_elapsed("estimate", checkpoint.estimate_nanos);
        if built {
            engine.rank = rank_of(&checkpoint.progress.order);
            engine.searchers = checkpoint.searchers;
            engine.cache = match checkpoint.cache {
                Some(entries) => PairwiseDistanceCache::restore(engine.cache.keying(), entries),
                None => PairwiseDistanceCache::new(engine.cache.keying()),
            };
            engine.state = EngineState::Building {
                round: checkpoint.progress.round,
            };
            engine.progress = checkpoint.progress;
        }

        info!(
            cursor = engine.progress.cursor,
            cached = engine.cache.len(),
            "resumed leave-one-out run"
        );
        Ok(engine)
    }

    /// Attach a cancellation token, checked between rounds.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Execute at most one round and return the resulting state.
    ///
    /// A paused run re-checks its budget first, so raising a limit lets it continue.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::AlreadyFinished`] | the run has finished |
    /// | [`LoocvError::CacheInconsistent`] | verification is on and a cache hit disagrees |
    /// | timer errors | internal timer misuse |
    pub fn advance(&mut self) -> Result<EngineState, LoocvError> {
        match self.state {
            EngineState::Finished => return Err(LoocvError::AlreadyFinished),
            EngineState::Idle => self.build()?,
            EngineState::Building { .. } | EngineState::Paused(_) => {}
        }

        if let Some(reason) = self.exhausted_budget() {
            if self.state != EngineState::Paused(reason) {
                info!(?reason, processed = self.progress.cursor, "leave-one-out paused");
            }
            self.state = EngineState::Paused(reason);
            return Ok(self.state);
        }

        self.round()?;

        if self.progress.cursor == self.data.len() {
            self.results = Some(self.assemble()?);
            self.state = EngineState::Finished;
            info!(
                rounds = self.progress.round,
                kernel_calls = self.progress.stats.kernel_calls,
                cache_hits = self.progress.stats.cache_hits,
                "leave-one-out finished"
            );
        } else {
            self.state = EngineState::Building {
                round: self.progress.round,
            };
        }
        Ok(self.state)
    }

    /// Advance until the run pauses or finishes.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`advance`][Self::advance].
    #[instrument(skip(self), fields(kernel = self.kernel.name(), n = self.data.len()))]
    pub fn run(&mut self) -> Result<EngineState, LoocvError> {
        if self.state == EngineState::Finished {
            return Ok(self.state);
        }
        loop {
            match self.advance()? {
                EngineState::Building { .. } => {}
                other => return Ok(other),
            }
        }
    }

    /// Assemble predictions from the current searchers and finish the run.
    ///
    /// # Errors
    ///
    /// Returns [`LoocvError::IncompleteRun`] when fewer than
    /// `min(neighbour_limit, n)` instances have been revealed.
    pub fn finish(&mut self) -> Result<LoocvResults, LoocvError> {
        if let Some(results) = &self.results {
            return Ok(results.clone());
        }
        let n = self.data.len();
        let expected = self.config.neighbour_limit.map_or(n, |limit| limit.min(n));
        if self.progress.cursor < expected {
            return Err(LoocvError::IncompleteRun {
                processed: self.progress.cursor,
                expected,
            });
        }
        if self.state == EngineState::Idle {
            self.build()?;
        }
        let results = self.assemble()?;
        self.results = Some(results.clone());
        self.state = EngineState::Finished;
        info!(processed = self.progress.cursor, "leave-one-out finished early");
        Ok(results)
    }

    /// Change the time limit, e.g. to let a paused run continue.
    pub fn set_train_time_limit(&mut self, limit: Option<Duration>) {
        self.config.train_time_limit = limit;
    }

    /// Change the neighbour limit, e.g. to let a paused run continue.
    pub fn set_neighbour_limit(&mut self, limit: Option<usize>) {
        self.config.neighbour_limit = limit;
    }

    /// Snapshot the run so it can be resumed later.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`LoocvError::AlreadyFinished`] | the run has finished |
    /// | [`LoocvError::TimerAlreadyEnabled`] | a timer is running |
    pub fn checkpoint(&self) -> Result<LoocvCheckpoint, LoocvError> {
        if self.state == EngineState::Finished {
            return Err(LoocvError::AlreadyFinished);
        }
        self.train_timer.check_disabled()?;
        self.estimate_timer.check_disabled()?;
        Ok(LoocvCheckpoint {
            format_version: CHECKPOINT_FORMAT_VERSION,
            kernel_fingerprint: self.kernel.fingerprint(),
            n_instances: self.data.len(),
            k: self.config.k,
            progress: self.progress.clone(),
            searchers: self.searchers.clone(),
            cache_keying: self.cache.keying(),
            cache: Some(self.cache.snapshot()),
            train_nanos: self.train_timer.elapsed_nanos(),
            estimate_nanos: self.estimate_timer.elapsed_nanos(),
        })
    }

    /// Return the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Return the progress record.
    #[must_use]
    pub fn progress(&self) -> &LoocvProgress {
        &self.progress
    }

    /// Return the work counters.
    #[must_use]
    pub fn stats(&self) -> LoocvStats {
        self.progress.stats
    }

    /// Number of instances revealed so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.progress.cursor
    }

    /// Return the per-instance searchers (empty until the first round).
    #[must_use]
    pub fn searchers(&self) -> &[NeighbourSearcher] {
        &self.searchers
    }

    /// Return the pairwise cache.
    #[must_use]
    pub fn cache(&self) -> &PairwiseDistanceCache {
        &self.cache
    }

    /// Return the kernel.
    #[must_use]
    pub fn kernel(&self) -> &ElasticKernel {
        &self.kernel
    }

    /// Setup nanoseconds so far.
    #[must_use]
    pub fn train_nanos(&self) -> u64 {
        self.train_timer.elapsed_nanos()
    }

    /// Round and assembly nanoseconds so far.
    #[must_use]
    pub fn estimate_nanos(&self) -> u64 {
        self.estimate_timer.elapsed_nanos()
    }

    fn build(&mut self) -> Result<(), LoocvError> {
        self.train_timer.enable()?;

        let k = self.config.k;
        self.searchers = self
            .data
            .iter()
            .enumerate()
            .map(|(i, seq)| {
                let label = seq.label().ok_or(LoocvError::MissingLabel { index: i })?;
                NeighbourSearcher::new(i, label, k)
            })
            .collect::<Result<_, _>>()?;
        self.progress = LoocvProgress {
            order: self.config.order.sequence(self.data.len()),
            ..LoocvProgress::default()
        };
        self.rank = rank_of(&self.progress.order);
        self.cache.clear();

        self.train_timer.disable()?;
        info!(
            n = self.data.len(),
            k,
            n_classes = self.n_classes,
            keying = ?self.cache.keying(),
            "leave-one-out searchers built"
        );
        self.state = EngineState::Building { round: 0 };
        Ok(())
    }

    fn exhausted_budget(&self) -> Option<PauseReason> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(PauseReason::Cancelled);
        }
        if let Some(limit) = self.config.neighbour_limit
            && self.progress.cursor >= limit
        {
            return Some(PauseReason::NeighbourLimit);
        }
        if let Some(limit) = self.config.train_time_limit {
            let projected = u128::from(self.estimate_timer.elapsed_nanos())
                + u128::from(self.progress.previous_round_nanos);
            if projected >= limit.as_nanos() {
                return Some(PauseReason::TimeBudget);
            }
        }
        None
    }

    /// Reveal the next instance in the order to every other searcher.
    fn round(&mut self) -> Result<(), LoocvError> {
        self.estimate_timer.enable()?;
        let before = self.estimate_timer.elapsed_nanos();

        let data = self.data;
        let position = self.progress.cursor;
        let current = self.progress.order[position];
        let current_seq = &data[current];
        let current_label = self.searchers[current].label();

        // Cache reads stay on this thread; each hit is consumed here.
        let lookups: Vec<Option<(DistanceResult, u64)>> = (0..data.len())
            .map(|y| {
                if y == current {
                    return None;
                }
                let start = std::time::Instant::now();
                let hit = self.cache.take(y, current)?;
                let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
                Some((hit, nanos))
            })
            .collect();

        let kernel = &self.kernel;
        let verify = self.config.verify_cache_hits;

        let resolutions: Result<Vec<Option<Resolution>>, LoocvError> = self
            .searchers
            .par_iter_mut()
            .zip(lookups.into_par_iter())
            .map(|(searcher, lookup)| -> Result<Option<Resolution>, LoocvError> {
                let y = searcher.index();
                if y == current {
                    return Ok(None);
                }
                match lookup {
                    Some((hit, nanos)) => {
                        if verify {
                            verify_hit(kernel, &data[y], current_seq, hit, y, current)?;
                        }
                        searcher.add_precomputed(current, current_label, hit.distance, nanos)?;
                        Ok(Some(Resolution::Cached))
                    }
                    None => {
                        let result = searcher.add(kernel, &data[y], current, current_seq)?;
                        Ok(Some(Resolution::Computed(result)))
                    }
                }
            })
            .collect::<Result<_, _>>();
        let resolutions = match resolutions {
            Ok(resolutions) => resolutions,
            Err(e) => {
                self.estimate_timer.disable()?;
                return Err(e);
            }
        };

        // Store fresh results only for searchers whose own turn is still ahead.
        let mut stats = self.progress.stats;
        for (y, resolution) in resolutions.into_iter().enumerate() {
            match resolution {
                None => {}
                Some(Resolution::Cached) => stats.cache_hits += 1,
                Some(Resolution::Computed(result)) => {
                    stats.kernel_calls += 1;
                    if result.distance.is_abandoned() {
                        stats.abandoned += 1;
                    } else if self.cache.keying() == CacheKeying::Symmetric
                        && self.rank[y] > position
                    {
                        self.cache.put(y, current, result);
                    }
                }
            }
        }
        stats.distinct_pairs += (data.len() - 1 - position) as u64;

        self.progress.stats = stats;
        self.progress.cursor += 1;
        self.progress.round += 1;

        self.estimate_timer.disable()?;
        self.progress.previous_round_nanos = self.estimate_timer.elapsed_nanos().saturating_sub(before);

        debug!(
            round = self.progress.round,
            instance = current,
            nanos = self.progress.previous_round_nanos,
            cached = self.cache.len(),
            "round complete"
        );
        Ok(())
    }

    fn assemble(&mut self) -> Result<LoocvResults, LoocvError> {
        self.estimate_timer.enable()?;
        let n_classes = self.n_classes;
        let predictions = self
            .searchers
            .iter_mut()
            .map(|s| {
                let p = s.predict(n_classes);
                InstancePrediction {
                    index: s.index(),
                    true_label: s.label(),
                    distribution: p.distribution,
                    predicted: p.predicted,
                    elapsed_nanos: p.elapsed_nanos,
                }
            })
            .collect();
        self.estimate_timer.disable()?;

        Ok(LoocvResults {
            predictions,
            n_classes,
            build_nanos: self.train_timer.elapsed_nanos(),
            estimate_nanos: self.estimate_timer.elapsed_nanos(),
            stats: self.progress.stats,
        })
    }
}

fn validate_dataset(data: &[Sequence], config: &LoocvConfig) -> Result<usize, LoocvError> {
    if config.k == 0 {
        return Err(LoocvError::InvalidNeighbourCount { k: config.k });
    }
    if data.is_empty() {
        return Err(LoocvError::EmptyDataset);
    }
    let mut max_label = 0;
    for (index, seq) in data.iter().enumerate() {
        let label = seq.label().ok_or(LoocvError::MissingLabel { index })?;
        max_label = max_label.max(label);
    }
    Ok(max_label + 1)
}

fn mismatch(reason: String) -> LoocvError {
    LoocvError::CheckpointMismatch { reason }
}

fn keying_for(kernel: &ElasticKernel) -> CacheKeying {
    if kernel.is_symmetric() {
        CacheKeying::Symmetric
    } else {
        CacheKeying::Ordered
    }
}

/// The order must be a permutation of the dataset and the cursor must agree with the round count.
fn check_progress(data: &[Sequence], progress: &LoocvProgress) -> Result<(), LoocvError> {
    let n = data.len();
    if progress.order.len() != n {
        return Err(mismatch(format!(
            "order has {} entries, dataset has {n}",
            progress.order.len()
        )));
    }
    let mut seen = vec![false; n];
    for &i in &progress.order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(mismatch(format!("instance {i} appears twice in the order"))),
            None => return Err(mismatch(format!("order entry {i} is out of range"))),
        }
    }
    if progress.cursor > n || progress.cursor != progress.round {
        return Err(mismatch(format!(
            "cursor {} and round {} are inconsistent",
            progress.cursor, progress.round
        )));
    }
    Ok(())
}

/// Searcher `i` must belong to instance `i` and hold only neighbours from the dataset.
fn check_searchers(data: &[Sequence], searchers: &[NeighbourSearcher]) -> Result<(), LoocvError> {
    if searchers.len() != data.len() {
        return Err(mismatch(format!(
            "{} searchers for {} instances",
            searchers.len(),
            data.len()
        )));
    }
    for (i, (searcher, seq)) in searchers.iter().zip(data).enumerate() {
        if searcher.index() != i || Some(searcher.label()) != seq.label() {
            return Err(mismatch(format!(
                "searcher {i} holds instance {} with label {}",
                searcher.index(),
                searcher.label()
            )));
        }
        for n in searcher.neighbours() {
            let consistent =
                n.index != i && data.get(n.index).is_some_and(|d| d.label() == Some(n.label));
            if !consistent {
                return Err(mismatch(format!(
                    "searcher {i} retains unknown neighbour {} with label {}",
                    n.index, n.label
                )));
            }
        }
    }
    Ok(())
}

fn rank_of(order: &[usize]) -> Vec<usize> {
    let mut rank = vec![0; order.len()];
    for (position, &i) in order.iter().enumerate() {
        rank[i] = position;
    }
    rank
}

fn verify_hit(
    kernel: &ElasticKernel,
    target: &Sequence,
    candidate: &Sequence,
    hit: DistanceResult,
    a: usize,
    b: usize,
) -> Result<(), LoocvError> {
    let fresh = kernel.distance(target.as_view(), candidate.as_view()).value();
    let cached = hit.distance.value();
    if (fresh - cached).abs() > VERIFY_TOLERANCE * fresh.abs().max(cached.abs()).max(1.0) {
        return Err(LoocvError::CacheInconsistent {
            a,
            b,
            cached,
            fresh,
        });
    }
    Ok(())
}
