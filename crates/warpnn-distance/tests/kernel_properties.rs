//! Property tests: cutoff law, symmetry, and agreement with full-matrix references.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

use warpnn_distance::{
    BandConstraint, Dtw, ElasticDistance, ElasticKernel, Erp, Lcss, Msm, TimeSeries, Twed, Wdtw,
};

const TOL: f64 = 1e-9;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= TOL * (1.0 + expected.abs())
}

fn series_strategy(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10.0f64..10.0, 1..=max_len)
}

fn all_kernels() -> Vec<ElasticKernel> {
    vec![
        Dtw::unconstrained().into(),
        Dtw::with_sakoe_chiba(2).into(),
        Wdtw::new(0.1).unwrap().into(),
        Erp::new(BandConstraint::SakoeChibaRadius(3), 0.5).unwrap().into(),
        Lcss::new(BandConstraint::SakoeChibaRadius(3), 1.0).unwrap().into(),
        Msm::new(0.5).unwrap().into(),
        Twed::new(1.0, 0.01).unwrap().into(),
        ElasticKernel::derivative(Wdtw::new(0.1).unwrap().into()),
    ]
}

/// Full-matrix DTW over squared differences with an optional band.
fn reference_dtw(a: &[f64], b: &[f64], radius: Option<usize>) -> f64 {
    let (n, m) = (a.len(), b.len());
    let mut c = vec![vec![f64::INFINITY; m + 1]; n + 1];
    c[0][0] = 0.0;
    for i in 1..=n {
        for j in 1..=m {
            if radius.is_some_and(|r| i.abs_diff(j) > r) {
                continue;
            }
            let best = c[i - 1][j - 1].min(c[i - 1][j]).min(c[i][j - 1]);
            c[i][j] = (a[i - 1] - b[j - 1]).powi(2) + best;
        }
    }
    c[n][m]
}

/// Full-matrix MSM.
fn reference_msm(a: &[f64], b: &[f64], cost: f64) -> f64 {
    let split = |new: f64, x: f64, y: f64| {
        if (x <= new && new <= y) || (y <= new && new <= x) {
            cost
        } else {
            cost + (new - x).abs().min((new - y).abs())
        }
    };
    let (n, m) = (a.len(), b.len());
    let mut c = vec![vec![0.0; m]; n];
    c[0][0] = (a[0] - b[0]).abs();
    for i in 1..n {
        c[i][0] = c[i - 1][0] + split(a[i], a[i - 1], b[0]);
    }
    for j in 1..m {
        c[0][j] = c[0][j - 1] + split(b[j], a[0], b[j - 1]);
    }
    for i in 1..n {
        for j in 1..m {
            let d1 = c[i - 1][j - 1] + (a[i] - b[j]).abs();
            let d2 = c[i - 1][j] + split(a[i], a[i - 1], b[j]);
            let d3 = c[i][j - 1] + split(b[j], a[i], b[j - 1]);
            c[i][j] = d1.min(d2.min(d3));
        }
    }
    c[n - 1][m - 1]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn cutoff_law_holds_for_every_kernel(
        a in series_strategy(16),
        b in series_strategy(16),
        fraction in 0.0f64..2.0,
    ) {
        let a = TimeSeries::new(a).unwrap();
        let b = TimeSeries::new(b).unwrap();
        for kernel in all_kernels() {
            let full = kernel.distance(a.as_view(), b.as_view()).value();
            if !full.is_finite() {
                continue;
            }
            let cutoff = full * fraction;
            let bounded = kernel.distance_with_cutoff(a.as_view(), b.as_view(), cutoff);
            if full < cutoff {
                prop_assert!(close(bounded.value(), full), "{}: {} vs {}", kernel.name(), bounded, full);
            } else {
                prop_assert!(bounded.is_abandoned(), "{}: expected abandon at {}", kernel.name(), cutoff);
            }
        }
    }

    #[test]
    fn symmetric_kernels_are_symmetric(a in series_strategy(12), b in series_strategy(12)) {
        let a = TimeSeries::new(a).unwrap();
        let b = TimeSeries::new(b).unwrap();
        let kernels: Vec<ElasticKernel> = vec![
            Dtw::unconstrained().into(),
            Wdtw::new(0.2).unwrap().into(),
            Erp::new(BandConstraint::Unconstrained, 0.0).unwrap().into(),
            Msm::new(1.0).unwrap().into(),
            Twed::new(0.5, 0.1).unwrap().into(),
        ];
        for kernel in kernels {
            prop_assert!(kernel.is_symmetric());
            let ab = kernel.distance(a.as_view(), b.as_view()).value();
            let ba = kernel.distance(b.as_view(), a.as_view()).value();
            prop_assert!(close(ab, ba), "{}: {} vs {}", kernel.name(), ab, ba);
        }
    }

    #[test]
    fn distances_are_non_negative(a in series_strategy(10), b in series_strategy(10)) {
        let a = TimeSeries::new(a).unwrap();
        let b = TimeSeries::new(b).unwrap();
        for kernel in all_kernels() {
            let d = kernel.distance(a.as_view(), b.as_view()).value();
            prop_assert!(d >= 0.0, "{}: negative distance {}", kernel.name(), d);
        }
    }

    #[test]
    fn lcss_stays_in_unit_interval(a in series_strategy(10), b in series_strategy(10)) {
        let a = TimeSeries::new(a).unwrap();
        let b = TimeSeries::new(b).unwrap();
        let lcss = Lcss::new(BandConstraint::Unconstrained, 0.5).unwrap();
        let d = lcss.distance(a.as_view(), b.as_view()).value();
        prop_assert!((0.0..=1.0).contains(&d));
    }

    #[test]
    fn rolling_dtw_matches_full_matrix(a in series_strategy(14), b in series_strategy(14)) {
        let (ta, tb) = (TimeSeries::new(a.clone()).unwrap(), TimeSeries::new(b.clone()).unwrap());
        let rolling = Dtw::unconstrained().distance(ta.as_view(), tb.as_view()).value();
        prop_assert!(close(rolling, reference_dtw(&a, &b, None)));

        let banded = Dtw::with_sakoe_chiba(2).distance(ta.as_view(), tb.as_view()).value();
        let expected = reference_dtw(&a, &b, Some(2));
        if expected.is_finite() {
            prop_assert!(close(banded, expected));
        } else {
            prop_assert!(banded.is_infinite());
        }
    }

    #[test]
    fn rolling_msm_matches_full_matrix(a in series_strategy(12), b in series_strategy(12)) {
        let (ta, tb) = (TimeSeries::new(a.clone()).unwrap(), TimeSeries::new(b.clone()).unwrap());
        let rolling = Msm::new(0.3).unwrap().distance(ta.as_view(), tb.as_view()).value();
        prop_assert!(close(rolling, reference_msm(&a, &b, 0.3)));
    }
}
