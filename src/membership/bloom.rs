//! Bloom filter for probabilistic set membership
//!
//! A Bloom filter answers "possibly present" or "definitely absent".
//! False positives are possible; false negatives are not, because bits are
//! only ever set and there is no deletion.

use crate::hash::{HashFamily, DEFAULT_SEED};
use crate::membership::bits::BitArray;
use crate::traits::{MergeError, Sketch};
use core::hash::Hash;

/// Bloom filter over `m` bits and `k` seeded hash functions
///
/// # Example
///
/// ```
/// use streamstats::membership::MembershipFilter;
///
/// let mut filter = MembershipFilter::new(1000, 3);
///
/// filter.insert("apple");
/// filter.insert("banana");
///
/// assert!(filter.possibly_contains("apple"));   // never a false negative
/// assert!(filter.possibly_contains("banana"));
/// // "cherry" is very likely absent, but may be a false positive
/// ```
///
/// # False Positive Rate
///
/// After `n` distinct insertions the false-positive probability is
/// approximately `(1 - e^{-kn/m})^k`, reported by
/// [`theoretical_false_positive_rate`](Self::theoretical_false_positive_rate).
/// Inserting more items than the filter was sized for raises it quickly.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MembershipFilter {
    bits: BitArray,
    hashes: HashFamily,
    /// Number of insert calls (duplicates included)
    count: u64,
}

impl MembershipFilter {
    /// Create a filter with `num_bits` bits and `num_hashes` hash functions
    ///
    /// # Panics
    ///
    /// Panics if either dimension is 0.
    pub fn new(num_bits: usize, num_hashes: usize) -> Self {
        Self::with_seed(num_bits, num_hashes, DEFAULT_SEED)
    }

    /// Like [`new`](Self::new) with an explicit hash seed
    ///
    /// Filters only merge when bits, hash count and seed all match.
    pub fn with_seed(num_bits: usize, num_hashes: usize, seed: u64) -> Self {
        assert!(num_bits > 0, "num_bits must be positive");
        assert!(num_hashes > 0, "num_hashes must be positive");

        Self {
            bits: BitArray::new(num_bits),
            hashes: HashFamily::new(num_hashes, seed),
            count: 0,
        }
    }

    /// Size a filter for `expected_items` at the given false-positive rate
    ///
    /// Uses the optimal `m = -n·ln(p) / ln(2)²` and `k = (m/n)·ln(2)`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in (0, 1).
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be positive");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let (num_bits, num_hashes) = optimal_dimensions(expected_items, false_positive_rate);
        Self::new(num_bits, num_hashes)
    }

    /// Insert a key
    pub fn insert<K: Hash + ?Sized>(&mut self, key: &K) {
        self.count += 1;
        let m = self.bits.len();
        for idx in self.hashes.indices(key, m) {
            self.bits.set(idx);
        }
    }

    /// Test membership
    ///
    /// `false` means the key was definitely never inserted; `true` means it
    /// was inserted or is a false positive.
    pub fn possibly_contains<K: Hash + ?Sized>(&self, key: &K) -> bool {
        let m = self.bits.len();
        self.hashes.indices(key, m).all(|idx| self.bits.get(idx))
    }

    /// Number of bits (m)
    pub fn num_bits(&self) -> usize {
        self.bits.len()
    }

    /// Number of hash functions (k)
    pub fn num_hashes(&self) -> usize {
        self.hashes.len()
    }

    /// Hash family seed
    pub fn seed(&self) -> u64 {
        self.hashes.seed()
    }

    /// Number of bits set to 1
    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// `(1 - e^{-kn/m})^k` with `n` the number of insertions
    pub fn theoretical_false_positive_rate(&self) -> f64 {
        false_positive_rate(self.num_bits(), self.num_hashes(), self.count)
    }

    /// False-positive rate from the observed fill ratio, `(bits_set / m)^k`
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let fill = self.bits_set() as f64 / self.num_bits() as f64;
        fill.powi(self.num_hashes() as i32)
    }

    /// Estimate the number of distinct keys inserted from the fill ratio
    ///
    /// `n ≈ -(m/k)·ln(1 - X/m)`; infinite once every bit is set.
    pub fn estimated_count(&self) -> f64 {
        let x = self.bits_set() as f64;
        let m = self.num_bits() as f64;
        let k = self.num_hashes() as f64;
        if x >= m {
            return f64::INFINITY;
        }
        -(m / k) * (1.0 - x / m).ln()
    }

    fn describe(&self) -> String {
        format!(
            "bits={}, hashes={}, seed={:#x}",
            self.num_bits(),
            self.num_hashes(),
            self.seed()
        )
    }
}

/// Standard Bloom false-positive formula `(1 - e^{-kn/m})^k`
pub fn false_positive_rate(num_bits: usize, num_hashes: usize, items: u64) -> f64 {
    let k = num_hashes as f64;
    let exponent = -k * items as f64 / num_bits as f64;
    (1.0 - exponent.exp()).powf(k)
}

/// Optimal `(m, k)` for `n` items at false-positive rate `p`
pub fn optimal_dimensions(expected_items: usize, false_positive_rate: f64) -> (usize, usize) {
    let n = expected_items as f64;
    let ln2 = core::f64::consts::LN_2;
    let num_bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil() as usize;
    let num_bits = num_bits.max(64);
    let num_hashes = ((num_bits as f64 / n) * ln2).round() as usize;
    (num_bits, num_hashes.clamp(1, 32))
}

impl Sketch for MembershipFilter {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        self.insert(item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.bits.len() != other.bits.len() || self.hashes != other.hashes {
            return Err(MergeError::IncompatibleConfig {
                expected: self.describe(),
                found: other.describe(),
            });
        }

        self.bits.union_with(&other.bits);
        self.count += other.count;
        Ok(())
    }

    fn clear(&mut self) {
        self.bits.clear();
        self.count = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.bits.size_bytes()
            + self.num_hashes() * core::mem::size_of::<u64>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut filter = MembershipFilter::new(1000, 3);
        filter.insert("apple");
        filter.insert("banana");
        filter.insert(&42u64);

        assert!(filter.possibly_contains("apple"));
        assert!(filter.possibly_contains("banana"));
        assert!(filter.possibly_contains(&42u64));
        assert_eq!(filter.count(), 3);
    }

    #[test]
    fn test_empty_contains_nothing() {
        let filter = MembershipFilter::new(1000, 3);
        for i in 0..100u32 {
            assert!(!filter.possibly_contains(&i));
        }
    }

    #[test]
    fn test_no_false_negatives() {
        for (m, k) in [(64, 1), (100, 7), (1000, 3), (10_000, 5)] {
            let mut filter = MembershipFilter::new(m, k);
            for i in 0..500u32 {
                filter.insert(&i);
            }
            for i in 0..500u32 {
                assert!(filter.possibly_contains(&i), "m={} k={} missing {}", m, k, i);
            }
        }
    }

    #[test]
    fn test_with_rate_sizing() {
        let filter = MembershipFilter::with_rate(1000, 0.01);
        // m ≈ 9586, k ≈ 7
        assert!(filter.num_bits() > 9000 && filter.num_bits() < 10_000);
        assert_eq!(filter.num_hashes(), 7);
    }

    #[test]
    fn test_false_positive_rate() {
        let mut filter = MembershipFilter::with_rate(1000, 0.01);
        for i in 0..1000 {
            filter.insert(format!("item_{}", i).as_str());
        }

        let false_positives = (0..10_000)
            .filter(|i| filter.possibly_contains(format!("other_{}", i).as_str()))
            .count();
        let rate = false_positives as f64 / 10_000.0;
        assert!(rate < 0.03, "FP rate too high: {}", rate);
        assert!((filter.theoretical_false_positive_rate() - 0.01).abs() < 0.005);
    }

    #[test]
    fn test_formula() {
        // m=1000, k=3, n=50: (1 - e^{-0.15})^3
        let expected = (1.0 - (-0.15f64).exp()).powi(3);
        assert!((false_positive_rate(1000, 3, 50) - expected).abs() < 1e-15);
        assert_eq!(false_positive_rate(1000, 3, 0), 0.0);
    }

    #[test]
    fn test_merge() {
        let mut a = MembershipFilter::new(1000, 3);
        let mut b = MembershipFilter::new(1000, 3);
        a.insert("apple");
        b.insert("banana");

        a.merge(&b).unwrap();
        assert!(a.possibly_contains("apple"));
        assert!(a.possibly_contains("banana"));
        assert_eq!(a.count(), 2);
    }

    #[test]
    fn test_merge_incompatible() {
        let mut a = MembershipFilter::new(1000, 3);
        assert!(a.merge(&MembershipFilter::new(2000, 3)).is_err());
        assert!(a.merge(&MembershipFilter::new(1000, 4)).is_err());
        assert!(a.merge(&MembershipFilter::with_seed(1000, 3, 1)).is_err());
    }

    #[test]
    fn test_bytes_through_sketch_trait() {
        let mut filter = MembershipFilter::new(512, 4);
        Sketch::update(&mut filter, b"raw".as_slice());
        assert!(filter.possibly_contains(b"raw".as_slice()));
    }

    #[test]
    fn test_estimated_count() {
        let mut filter = MembershipFilter::with_rate(1000, 0.01);
        for i in 0..500u32 {
            filter.insert(&i);
        }
        let estimated = filter.estimated_count();
        assert!(estimated > 450.0 && estimated < 550.0, "estimate={}", estimated);
    }

    #[test]
    fn test_clear() {
        let mut filter = MembershipFilter::new(100, 2);
        filter.insert("apple");
        filter.clear();
        assert!(!filter.possibly_contains("apple"));
        assert_eq!(filter.bits_set(), 0);
        assert!(filter.is_empty());
    }

    #[test]
    #[should_panic(expected = "num_bits must be positive")]
    fn test_zero_bits_panics() {
        MembershipFilter::new(0, 3);
    }
}
