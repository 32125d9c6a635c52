//! End-to-end leave-one-out runs: pair accounting, budgets, checkpoints.
//!
//! Uses a deterministic three-class synthetic dataset so that every run over
//! the same kernel and config produces identical predictions.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use warpnn_distance::{
    BandConstraint, Distance, Dtw, ElasticKernel, Erp, Lcss, Msm, Sequence, Twed, Wdtw,
};
use warpnn_loocv::{
    CacheKeying, CancelToken, EngineState, IncrementalLoocv, LoocvCheckpoint, LoocvConfig,
    LoocvError, LoocvResults, NeighbourOrder, NeighbourSearcher, PauseReason,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `n` noisy sequences in three shape classes: flat, rising, sine. Round-robin labels.
fn make_dataset(n: usize, len: usize, seed: u64) -> Vec<Sequence> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let class = i % 3;
            let values = (0..len)
                .map(|t| {
                    let x = t as f64 / len as f64;
                    let base = match class {
                        0 => 0.0,
                        1 => 2.0 * x,
                        _ => (x * std::f64::consts::TAU).sin(),
                    };
                    base + (rng.r#gen::<f64>() - 0.5) * 0.2
                })
                .collect();
            Sequence::labeled(values, class).expect("valid test sequence")
        })
        .collect()
}

fn dtw() -> ElasticKernel {
    Dtw::unconstrained().into()
}

fn run_to_end(data: &[Sequence], kernel: ElasticKernel, config: LoocvConfig) -> LoocvResults {
    let mut engine = IncrementalLoocv::new(data, kernel, config).unwrap();
    assert_eq!(engine.run().unwrap(), EngineState::Finished);
    engine.finish().unwrap()
}

fn assert_same_predictions(a: &LoocvResults, b: &LoocvResults) {
    assert_eq!(a.predictions.len(), b.predictions.len());
    for (pa, pb) in a.predictions.iter().zip(&b.predictions) {
        assert_eq!(pa.index, pb.index);
        assert_eq!(pa.true_label, pb.true_label);
        assert_eq!(pa.predicted, pb.predicted, "instance {}", pa.index);
        assert_eq!(pa.distribution, pb.distribution, "instance {}", pa.index);
    }
}

// ---------------------------------------------------------------------------
// a) pair accounting
// ---------------------------------------------------------------------------

#[test]
fn finished_run_compares_every_pair_once() {
    let data = make_dataset(12, 16, 1);
    let n = data.len() as u64;
    let results = run_to_end(&data, dtw(), LoocvConfig::new(1).unwrap());

    assert_eq!(results.predictions.len(), 12);
    assert_eq!(results.stats.distinct_pairs, n * (n - 1) / 2);
    assert_eq!(
        results.stats.kernel_calls + results.stats.cache_hits,
        n * (n - 1)
    );
}

#[test]
fn every_searcher_sees_every_other_instance_once() {
    let data = make_dataset(10, 12, 18);
    let orders = [NeighbourOrder::Linear, NeighbourOrder::Shuffled { seed: 3 }];
    for k in [1, 3] {
        for order in orders {
            let config = LoocvConfig::new(k).unwrap().with_order(order);
            let mut engine = IncrementalLoocv::new(&data, dtw(), config).unwrap();
            assert_eq!(engine.run().unwrap(), EngineState::Finished);
            for s in engine.searchers() {
                assert_eq!(
                    s.seen(),
                    data.len() - 1,
                    "k={k}, {order:?}, searcher {}",
                    s.index()
                );
            }
        }
    }
}

#[test]
fn without_pruning_every_reverse_pair_is_a_cache_hit() {
    let data = make_dataset(9, 12, 2);
    let n = data.len() as u64;
    let config = LoocvConfig::new(data.len()).unwrap();
    let mut engine = IncrementalLoocv::new(&data, dtw(), config).unwrap();
    engine.run().unwrap();

    let stats = engine.stats();
    assert_eq!(stats.kernel_calls, n * (n - 1) / 2);
    assert_eq!(stats.cache_hits, n * (n - 1) / 2);
    assert_eq!(stats.abandoned, 0);
    assert!(engine.cache().is_empty());
}

#[test]
fn asymmetric_kernel_never_hits_cache() {
    let data = make_dataset(9, 12, 3);
    let n = data.len() as u64;
    let lcss: ElasticKernel = Lcss::new(BandConstraint::Unconstrained, 0.1)
        .unwrap()
        .into();
    let mut engine = IncrementalLoocv::new(&data, lcss, LoocvConfig::new(1).unwrap()).unwrap();
    assert_eq!(engine.cache().keying(), CacheKeying::Ordered);
    engine.run().unwrap();

    assert_eq!(engine.stats().cache_hits, 0);
    assert_eq!(engine.stats().kernel_calls, n * (n - 1));
}

// ---------------------------------------------------------------------------
// b) classification quality
// ---------------------------------------------------------------------------

#[test]
fn separable_classes_are_recovered_by_every_kernel() {
    let data = make_dataset(15, 20, 4);
    let band = BandConstraint::from_fraction(0.2, 20).unwrap();
    let kernels: Vec<ElasticKernel> = vec![
        Dtw::from_constraint(band).into(),
        Wdtw::new(0.05).unwrap().into(),
        Erp::new(band, 0.0).unwrap().into(),
        Lcss::new(band, 0.15).unwrap().into(),
        Msm::new(0.5).unwrap().into(),
        Twed::new(1.0, 0.001).unwrap().into(),
    ];
    for kernel in kernels {
        let fingerprint = kernel.fingerprint();
        let results = run_to_end(&data, kernel, LoocvConfig::new(1).unwrap());
        assert!(
            results.accuracy() > 0.9,
            "{fingerprint}: accuracy {}",
            results.accuracy()
        );
        let cm = results.confusion_matrix().unwrap();
        assert_eq!(cm.total(), 15);
    }
}

#[test]
fn derivative_kernel_runs_to_completion() {
    let data = make_dataset(9, 16, 5);
    let kernel = ElasticKernel::derivative(dtw());
    let results = run_to_end(&data, kernel, LoocvConfig::new(3).unwrap());
    assert_eq!(results.predictions.len(), 9);
    for p in &results.predictions {
        let sum: f64 = p.distribution.as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }
}

#[test]
fn shuffled_order_matches_linear_predictions() {
    let data = make_dataset(12, 16, 6);
    let linear = run_to_end(&data, dtw(), LoocvConfig::new(1).unwrap());
    let shuffled = run_to_end(
        &data,
        dtw(),
        LoocvConfig::new(1)
            .unwrap()
            .with_order(NeighbourOrder::Shuffled { seed: 9 }),
    );
    assert_same_predictions(&linear, &shuffled);
}

#[test]
fn verified_cache_hits_pass() {
    let data = make_dataset(9, 12, 7);
    let config = LoocvConfig::new(2).unwrap().with_verify_cache_hits(true);
    let results = run_to_end(&data, Msm::new(1.0).unwrap().into(), config);
    assert!(results.stats.cache_hits > 0);
}

// ---------------------------------------------------------------------------
// c) budgets
// ---------------------------------------------------------------------------

#[test]
fn neighbour_limit_pause_then_finish() {
    let data = make_dataset(10, 12, 8);
    let config = LoocvConfig::new(1).unwrap().with_neighbour_limit(Some(4));
    let mut engine = IncrementalLoocv::new(&data, dtw(), config).unwrap();

    assert_eq!(
        engine.run().unwrap(),
        EngineState::Paused(PauseReason::NeighbourLimit)
    );
    assert_eq!(engine.processed(), 4);

    let results = engine.finish().unwrap();
    assert_eq!(results.predictions.len(), 10);
    assert!(matches!(engine.advance(), Err(LoocvError::AlreadyFinished)));
}

#[test]
fn finish_before_any_round_is_incomplete() {
    let data = make_dataset(6, 8, 9);
    let mut engine = IncrementalLoocv::new(&data, dtw(), LoocvConfig::new(1).unwrap()).unwrap();
    assert!(matches!(
        engine.finish(),
        Err(LoocvError::IncompleteRun {
            processed: 0,
            expected: 6
        })
    ));
}

#[test]
fn zero_time_limit_pauses_until_raised() {
    let data = make_dataset(6, 8, 10);
    let config = LoocvConfig::new(1)
        .unwrap()
        .with_train_time_limit(Some(Duration::ZERO));
    let mut engine = IncrementalLoocv::new(&data, dtw(), config).unwrap();

    assert_eq!(
        engine.run().unwrap(),
        EngineState::Paused(PauseReason::TimeBudget)
    );
    assert_eq!(engine.processed(), 0);

    engine.set_train_time_limit(None);
    assert_eq!(engine.run().unwrap(), EngineState::Finished);
    assert_eq!(engine.processed(), 6);
}

#[test]
fn cancel_token_pauses_between_rounds() {
    let data = make_dataset(6, 8, 11);
    let token = CancelToken::new();
    token.cancel();
    let mut engine = IncrementalLoocv::new(&data, dtw(), LoocvConfig::new(1).unwrap())
        .unwrap()
        .with_cancel_token(token);
    assert_eq!(
        engine.run().unwrap(),
        EngineState::Paused(PauseReason::Cancelled)
    );
    assert_eq!(engine.processed(), 0);
}

// ---------------------------------------------------------------------------
// d) checkpoint and resume
// ---------------------------------------------------------------------------

fn paused_checkpoint(data: &[Sequence], kernel: ElasticKernel, k: usize, at: usize) -> LoocvCheckpoint {
    let config = LoocvConfig::new(k).unwrap().with_neighbour_limit(Some(at));
    let mut engine = IncrementalLoocv::new(data, kernel, config).unwrap();
    assert_eq!(
        engine.run().unwrap(),
        EngineState::Paused(PauseReason::NeighbourLimit)
    );
    engine.checkpoint().unwrap()
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
    let data = make_dataset(12, 16, 12);
    let baseline = run_to_end(&data, dtw(), LoocvConfig::new(3).unwrap());

    let checkpoint = paused_checkpoint(&data, dtw(), 3, 5);
    let bytes = checkpoint.to_bytes().unwrap();
    let restored = LoocvCheckpoint::from_bytes(&bytes).unwrap();

    let mut engine =
        IncrementalLoocv::resume(&data, dtw(), LoocvConfig::new(3).unwrap(), restored).unwrap();
    assert_eq!(engine.processed(), 5);
    assert_eq!(engine.run().unwrap(), EngineState::Finished);
    let resumed = engine.finish().unwrap();

    assert_same_predictions(&baseline, &resumed);
    assert_eq!(baseline.stats, resumed.stats);
}

#[test]
fn resume_without_cache_recomputes_but_predicts_the_same() {
    let data = make_dataset(12, 16, 13);
    let baseline = run_to_end(&data, dtw(), LoocvConfig::new(1).unwrap());

    let checkpoint = paused_checkpoint(&data, dtw(), 1, 6);
    assert!(checkpoint.cached_pairs() > 0);
    let compact = checkpoint.without_cache();

    let mut engine =
        IncrementalLoocv::resume(&data, dtw(), LoocvConfig::new(1).unwrap(), compact).unwrap();
    assert!(engine.cache().is_empty());
    engine.run().unwrap();
    let resumed = engine.finish().unwrap();

    assert_same_predictions(&baseline, &resumed);
    assert!(resumed.stats.cache_hits < baseline.stats.cache_hits);
}

#[test]
fn checkpoint_of_idle_engine_resumes_from_scratch() {
    let data = make_dataset(6, 8, 14);
    let engine = IncrementalLoocv::new(&data, dtw(), LoocvConfig::new(1).unwrap()).unwrap();
    let checkpoint = engine.checkpoint().unwrap();
    assert!(checkpoint.searchers.is_empty());

    let mut resumed =
        IncrementalLoocv::resume(&data, dtw(), LoocvConfig::new(1).unwrap(), checkpoint).unwrap();
    assert_eq!(resumed.state(), EngineState::Idle);
    assert_eq!(resumed.run().unwrap(), EngineState::Finished);
}

#[test]
fn resume_rejects_foreign_checkpoints() {
    let data = make_dataset(9, 12, 15);
    let checkpoint = paused_checkpoint(&data, dtw(), 2, 3);

    let other_kernel: ElasticKernel = Dtw::with_sakoe_chiba(2).into();
    let err = IncrementalLoocv::resume(
        &data,
        other_kernel,
        LoocvConfig::new(2).unwrap(),
        checkpoint.clone(),
    )
    .err();
    assert!(matches!(err, Some(LoocvError::CheckpointMismatch { .. })));

    let err = IncrementalLoocv::resume(
        &data,
        dtw(),
        LoocvConfig::new(3).unwrap(),
        checkpoint.clone(),
    )
    .err();
    assert!(matches!(err, Some(LoocvError::CheckpointMismatch { .. })));

    let err = IncrementalLoocv::resume(
        &data[..8],
        dtw(),
        LoocvConfig::new(2).unwrap(),
        checkpoint,
    )
    .err();
    assert!(matches!(err, Some(LoocvError::CheckpointMismatch { .. })));
}

fn assert_resume_rejected(data: &[Sequence], checkpoint: LoocvCheckpoint) {
    let config = LoocvConfig::new(2).unwrap();
    let err = IncrementalLoocv::resume(data, dtw(), config, checkpoint).err();
    assert!(
        matches!(err, Some(LoocvError::CheckpointMismatch { .. })),
        "expected mismatch, got {err:?}"
    );
}

#[test]
fn resume_rejects_out_of_range_order_entry() {
    let data = make_dataset(6, 8, 19);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    checkpoint.progress.order[3] = 99;
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn resume_rejects_duplicated_order_entry() {
    let data = make_dataset(6, 8, 20);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    checkpoint.progress.order[4] = checkpoint.progress.order[5];
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn resume_rejects_cursor_round_disagreement() {
    let data = make_dataset(6, 8, 21);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    checkpoint.progress.round += 1;
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn resume_rejects_misplaced_searchers() {
    let data = make_dataset(6, 8, 22);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    checkpoint.searchers.swap(0, 1);
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn resume_rejects_relabelled_searcher() {
    let data = make_dataset(6, 8, 23);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    checkpoint.searchers[0] = NeighbourSearcher::new(0, 7, 2).unwrap();
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn resume_rejects_neighbour_with_unknown_label() {
    let data = make_dataset(6, 8, 24);
    let mut checkpoint = paused_checkpoint(&data, dtw(), 2, 2);
    let mut tampered = NeighbourSearcher::new(5, data[5].label().unwrap(), 2).unwrap();
    tampered.add_precomputed(0, 42, Distance::new(0.1), 0).unwrap();
    checkpoint.searchers[5] = tampered;
    assert_resume_rejected(&data, checkpoint);
}

#[test]
fn checkpoint_file_roundtrip() {
    let data = make_dataset(9, 12, 16);
    let checkpoint = paused_checkpoint(&data, dtw(), 1, 4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ckpt");
    checkpoint.save(&path).unwrap();
    let loaded = LoocvCheckpoint::load(&path).unwrap();

    assert_eq!(loaded, checkpoint);
}

#[test]
fn corrupt_checkpoint_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.ckpt");
    std::fs::write(&path, b"not a checkpoint").unwrap();

    let err = LoocvCheckpoint::load(&path).unwrap_err();
    assert!(matches!(
        err,
        LoocvError::DeserializeCheckpoint { path: Some(_), .. }
    ));
}

#[test]
fn finished_engine_cannot_checkpoint() {
    let data = make_dataset(6, 8, 17);
    let mut engine = IncrementalLoocv::new(&data, dtw(), LoocvConfig::new(1).unwrap()).unwrap();
    engine.run().unwrap();
    assert!(matches!(
        engine.checkpoint(),
        Err(LoocvError::AlreadyFinished)
    ));
}
