//! Property tests for streamstats invariants
//!
//! Run with: cargo test --test properties

#[cfg(not(all(
    feature = "statistics",
    feature = "quantiles",
    feature = "robust",
    feature = "membership",
    feature = "frequency"
)))]
compile_error!("Property tests require the default features. Run: cargo test --test properties");

use proptest::prelude::*;
use streamstats::frequency::{FrequencySketch, HeavyHitterTracker, UpdatePolicy};
use streamstats::membership::MembershipFilter;
use streamstats::quantiles::{DigestEstimator, MarkerEstimator};
use streamstats::robust::RobustSpread;
use streamstats::statistics::MomentAccumulator;
use streamstats::traits::{Sketch, SketchError};

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1e3f64..1e3, 0..300)
}

/// Finite values with infinities mixed in
fn arb_values_with_infinities() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![
            8 => -1e3f64..1e3,
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ],
        0..300,
    )
}

fn arb_policy() -> impl Strategy<Value = UpdatePolicy> {
    prop_oneof![Just(UpdatePolicy::Standard), Just(UpdatePolicy::Conservative)]
}

fn arb_keys() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..200)
}

fn filter_of(keys: &[Vec<u8>]) -> MembershipFilter {
    let mut filter = MembershipFilter::new(1024, 3);
    for key in keys {
        filter.insert(key.as_slice());
    }
    filter
}

fn sketch_of(events: &[(u16, u64)]) -> FrequencySketch {
    let mut cms = FrequencySketch::new(64, 3);
    for (key, delta) in events {
        cms.update(key, *delta);
    }
    cms
}

// ============================================================================
// Moments
// ============================================================================

proptest! {
    #[test]
    fn moments_merge_matches_one_pass(values in arb_values(), split in any::<prop::sample::Index>()) {
        let at = split.index(values.len() + 1);
        let mut whole = MomentAccumulator::new();
        whole.extend(values.iter().copied());

        let mut left = MomentAccumulator::new();
        let mut right = MomentAccumulator::new();
        left.extend(values[..at].iter().copied());
        right.extend(values[at..].iter().copied());
        left.merge(&right).unwrap();

        prop_assert_eq!(left.len(), whole.len());
        prop_assert!(close(left.mean(), whole.mean(), 1e-9));
        prop_assert!(close(left.variance(), whole.variance(), 1e-9));
        prop_assert_eq!(left.min(), whole.min());
        prop_assert_eq!(left.max(), whole.max());
    }

    #[test]
    fn moments_variance_never_negative(values in arb_values()) {
        let mut acc = MomentAccumulator::new();
        for v in values {
            acc.update(v);
            prop_assert!(acc.variance() >= 0.0);
            prop_assert!(acc.sample_variance() >= 0.0);
        }
    }

    #[test]
    fn moments_merge_is_associative(a in arb_values(), b in arb_values(), c in arb_values()) {
        let acc = |values: &[f64]| {
            let mut m = MomentAccumulator::new();
            m.extend(values.iter().copied());
            m
        };
        let (a, b, c) = (acc(&a), acc(&b), acc(&c));

        let mut ab_c = a.clone();
        ab_c.merge(&b).unwrap();
        ab_c.merge(&c).unwrap();

        let mut bc = b.clone();
        bc.merge(&c).unwrap();
        let mut a_bc = a.clone();
        a_bc.merge(&bc).unwrap();

        prop_assert_eq!(ab_c.len(), a_bc.len());
        prop_assert!(close(ab_c.mean(), a_bc.mean(), 1e-9));
        prop_assert!(close(ab_c.variance(), a_bc.variance(), 1e-9));
    }
}

proptest! {
    #[test]
    fn non_finite_values_never_reach_the_summaries(values in arb_values_with_infinities()) {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        let mut acc = MomentAccumulator::new();
        let mut marker = MarkerEstimator::median();
        let mut digest = DigestEstimator::new(50.0);
        let mut spread = RobustSpread::with_markers(32);
        for &v in &values {
            acc.update(v);
            marker.update(v);
            digest.update(v);
            spread.update(v);
        }

        prop_assert_eq!(acc.len(), finite.len() as u64);
        prop_assert_eq!(marker.count(), finite.len() as u64);
        prop_assert_eq!(digest.count(), finite.len() as u64);
        prop_assert_eq!(spread.count(), finite.len() as u64);

        prop_assert!(acc.mean().is_finite() && acc.variance().is_finite());
        prop_assert!(acc.skewness().is_finite() && acc.kurtosis().is_finite());
        if let Some(median) = marker.quantile() {
            prop_assert!(median.is_finite());
        }
        if let Some(p99) = digest.quantile(0.99).unwrap() {
            prop_assert!(p99.is_finite());
        }
        if let Some(iqr) = spread.iqr() {
            prop_assert!(iqr.is_finite());
        }
    }
}

// ============================================================================
// Quantiles
// ============================================================================

proptest! {
    #[test]
    fn digest_quantiles_monotone_and_bounded(values in prop::collection::vec(-1e6f64..1e6, 1..500)) {
        let mut digest = DigestEstimator::new(25.0);
        for &v in &values {
            digest.update(v);
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut prev = f64::NEG_INFINITY;
        for i in 0..=100 {
            let q = digest.quantile(i as f64 / 100.0).unwrap().unwrap();
            let slack = 1e-12 * (1.0 + q.abs());
            prop_assert!(q >= prev - slack, "{} after {}", q, prev);
            prop_assert!(q >= min - slack && q <= max + slack);
            prev = q;
        }
        prop_assert_eq!(digest.count(), values.len() as u64);
    }

    #[test]
    fn digest_rejects_ranks_outside_unit_interval(p in prop_oneof![-1e3f64..-1e-9, (1.0f64 + 1e-9)..1e3]) {
        let mut digest = DigestEstimator::new(100.0);
        digest.update(1.0);
        prop_assert_eq!(digest.quantile(p), Err(SketchError::InvalidQuantile(p)));
    }

    #[test]
    fn marker_order_invariants(values in prop::collection::vec(-1e3f64..1e3, 5..400), p in 0.01f64..0.99) {
        let mut est = MarkerEstimator::new(p).unwrap();
        for v in values {
            est.update(v);
            let heights = est.marker_heights().unwrap_or(&[0.0; 5]);
            let positions = est.marker_positions().unwrap_or(&[1.0, 2.0, 3.0, 4.0, 5.0]);
            for i in 1..5 {
                prop_assert!(heights[i - 1] <= heights[i], "heights {:?}", heights);
                prop_assert!(positions[i - 1] < positions[i], "positions {:?}", positions);
            }
        }
        prop_assert!(est.is_tracking());
    }

    #[test]
    fn iqr_is_never_negative(values in prop::collection::vec(-1e3f64..1e3, 0..300)) {
        let mut markers = RobustSpread::with_markers(64);
        let mut digests = RobustSpread::with_digests(20.0, 64);
        for v in values {
            markers.update(v);
            digests.update(v);
        }
        if let Some(iqr) = markers.iqr() {
            prop_assert!(iqr >= 0.0);
        }
        if let Some(iqr) = digests.iqr() {
            prop_assert!(iqr >= 0.0);
        }
        if let Some(mad) = digests.mad() {
            prop_assert!(mad >= 0.0);
        }
    }
}

// ============================================================================
// Membership
// ============================================================================

proptest! {
    #[test]
    fn bloom_has_no_false_negatives(keys in arb_keys(), bits in 8usize..2048, hashes in 1usize..8) {
        let mut filter = MembershipFilter::new(bits, hashes);
        for key in &keys {
            filter.insert(key.as_slice());
        }
        for key in &keys {
            prop_assert!(filter.possibly_contains(key.as_slice()));
        }
    }

    #[test]
    fn bloom_merge_commutes_and_associates(a in arb_keys(), b in arb_keys(), c in arb_keys()) {
        let (a, b, c) = (filter_of(&a), filter_of(&b), filter_of(&c));

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();
        prop_assert_eq!(&ab, &ba);

        let mut ab_c = ab;
        ab_c.merge(&c).unwrap();
        let mut bc = b.clone();
        bc.merge(&c).unwrap();
        let mut a_bc = a.clone();
        a_bc.merge(&bc).unwrap();
        prop_assert_eq!(ab_c, a_bc);
    }
}

// ============================================================================
// Frequency
// ============================================================================

proptest! {
    #[test]
    fn count_min_never_under_counts(
        events in prop::collection::vec((any::<u16>(), 1u64..100), 0..300),
        width in 1usize..64,
        depth in 1usize..6,
        policy in arb_policy(),
    ) {
        let mut cms = FrequencySketch::new(width, depth).with_policy(policy);
        let mut truth = std::collections::HashMap::<u16, u64>::new();
        for (key, delta) in &events {
            cms.update(key, *delta);
            *truth.entry(*key).or_default() += delta;
        }
        for (key, count) in truth {
            prop_assert!(cms.estimate(&key) >= count);
        }
    }

    #[test]
    fn count_min_merge_commutes_and_associates(
        a in prop::collection::vec((any::<u16>(), 1u64..100), 0..100),
        b in prop::collection::vec((any::<u16>(), 1u64..100), 0..100),
        c in prop::collection::vec((any::<u16>(), 1u64..100), 0..100),
    ) {
        let (a, b, c) = (sketch_of(&a), sketch_of(&b), sketch_of(&c));

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();
        prop_assert_eq!(&ab, &ba);

        let mut ab_c = ab;
        ab_c.merge(&c).unwrap();
        let mut bc = b.clone();
        bc.merge(&c).unwrap();
        let mut a_bc = a.clone();
        a_bc.merge(&bc).unwrap();
        prop_assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn heavy_hitters_bounded_and_sorted(keys in prop::collection::vec(0u8..50, 0..500), k in 1usize..12) {
        let mut tracker = HeavyHitterTracker::<u8>::new(k, 128, 4);
        for key in &keys {
            tracker.update(key);
        }
        let top = tracker.top_k();
        prop_assert!(top.len() <= k);
        prop_assert_eq!(top.len(), tracker.len());
        prop_assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
        for (key, estimate) in &top {
            prop_assert!(tracker.contains(key));
            // Stored estimates refresh only on the key's own updates
            prop_assert!(*estimate <= tracker.estimate(key));
        }
    }
}
