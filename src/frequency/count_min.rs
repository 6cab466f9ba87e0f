//! Count-Min frequency sketch
//!
//! Each of `depth` rows hashes the key to one of `width` counters. A point
//! query takes the minimum over the rows, so collisions can only inflate
//! an estimate, never deflate it.

use crate::frequency::counters::CounterMatrix;
use crate::hash::{HashFamily, DEFAULT_SEED};
use crate::traits::{MergeError, Sketch};
use core::hash::Hash;

/// How an update touches the `depth` counters of a key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UpdatePolicy {
    /// Add `delta` to every row
    #[default]
    Standard,
    /// Raise each row only up to `estimate + delta`
    ///
    /// Keeps the no-under-count guarantee and reduces over-counting from
    /// collisions.
    Conservative,
}

/// Count-Min sketch for frequency estimation
///
/// Guarantees, with `N` the total of all deltas:
/// - `estimate(key) >= true_frequency(key)` always
/// - `estimate(key) <= true_frequency(key) + ε·N` with probability `1 - δ`,
///   where `ε = e / width` and `δ = e^{-depth}`
///
/// Counters saturate at `u64::MAX` instead of wrapping. Once that happens
/// [`is_saturated`](Self::is_saturated) turns true and estimates for the
/// affected keys are pinned at `u64::MAX`.
///
/// # Example
///
/// ```
/// use streamstats::frequency::FrequencySketch;
///
/// // 1% error, 0.1% failure probability
/// let mut cms = FrequencySketch::with_error(0.01, 0.001);
///
/// cms.update("apple", 5);
/// cms.update("banana", 3);
/// cms.update("apple", 2);
///
/// assert!(cms.estimate("apple") >= 7);
/// assert!(cms.estimate("banana") >= 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencySketch {
    counters: CounterMatrix,
    hashes: HashFamily,
    policy: UpdatePolicy,
    /// Sum of all deltas (saturating)
    total_count: u64,
    /// Number of update calls
    num_updates: u64,
}

impl FrequencySketch {
    /// Create a sketch with `width` counters per row and `depth` rows
    ///
    /// # Panics
    ///
    /// Panics if `width` or `depth` is 0.
    pub fn new(width: usize, depth: usize) -> Self {
        Self::with_seed(width, depth, DEFAULT_SEED)
    }

    /// Like [`new`](Self::new) with an explicit hash seed
    pub fn with_seed(width: usize, depth: usize, seed: u64) -> Self {
        Self {
            counters: CounterMatrix::new(width, depth),
            hashes: HashFamily::new(depth, seed),
            policy: UpdatePolicy::Standard,
            total_count: 0,
            num_updates: 0,
        }
    }

    /// Size the sketch from error parameters
    ///
    /// * `epsilon` - maximum overcount as a fraction of the total (e.g. 0.01)
    /// * `delta` - probability of exceeding that bound (e.g. 0.001)
    ///
    /// `width = ⌈e/ε⌉`, `depth = ⌈ln(1/δ)⌉`.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` or `delta` are not in (0, 1).
    pub fn with_error(epsilon: f64, delta: f64) -> Self {
        let (width, depth) = dimensions_for_error(epsilon, delta);
        Self::new(width, depth)
    }

    /// Switch the update policy
    ///
    /// Only affects later updates.
    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Counters per row
    pub fn width(&self) -> usize {
        self.counters.width()
    }

    /// Number of rows
    pub fn depth(&self) -> usize {
        self.counters.depth()
    }

    /// Current update policy
    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    /// Hash family seed
    pub fn seed(&self) -> u64 {
        self.hashes.seed()
    }

    /// Sum of all deltas added
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Whether any counter has clamped at `u64::MAX`
    pub fn is_saturated(&self) -> bool {
        self.counters.is_saturated()
    }

    /// Add `delta` occurrences of `key`
    pub fn update<K: Hash + ?Sized>(&mut self, key: &K, delta: u64) {
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(delta);

        let was_saturated = self.counters.is_saturated();
        let width = self.counters.width();

        match self.policy {
            UpdatePolicy::Standard => {
                for (row, col) in self.hashes.indices(key, width).enumerate() {
                    self.counters.add(row, col, delta);
                }
            }
            UpdatePolicy::Conservative => {
                let target = match self.estimate(key).checked_add(delta) {
                    Some(v) => v,
                    None => {
                        self.counters.mark_saturated();
                        u64::MAX
                    }
                };
                for (row, col) in self.hashes.indices(key, width).enumerate() {
                    self.counters.raise_to(row, col, target);
                }
            }
        }

        if !was_saturated && self.counters.is_saturated() {
            tracing::warn!(
                width,
                depth = self.counters.depth(),
                "count-min counter saturated at u64::MAX"
            );
        }
    }

    /// Estimated frequency of `key`, never below the true frequency
    pub fn estimate<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        self.hashes
            .indices(key, self.counters.width())
            .enumerate()
            .map(|(row, col)| self.counters.get(row, col))
            .min()
            .unwrap_or(0)
    }

    /// Additive error bound `ε·N` with `ε = e / width`
    pub fn error_bound(&self) -> u64 {
        let epsilon = core::f64::consts::E / self.width() as f64;
        (epsilon * self.total_count as f64) as u64
    }

    /// Estimate of the inner product of two frequency vectors
    ///
    /// Minimum over rows of the row dot products. `None` if the sketches
    /// have different dimensions or seeds.
    pub fn inner_product(&self, other: &Self) -> Option<u64> {
        if !self.compatible(other) {
            return None;
        }

        (0..self.depth())
            .map(|row| {
                self.counters
                    .row(row)
                    .iter()
                    .zip(other.counters.row(row))
                    .fold(0u64, |acc, (&a, &b)| acc.saturating_add(a.saturating_mul(b)))
            })
            .min()
    }

    fn compatible(&self, other: &Self) -> bool {
        self.width() == other.width() && self.hashes == other.hashes
    }

    fn describe(&self) -> String {
        format!(
            "{}x{}, seed={:#x}",
            self.width(),
            self.depth(),
            self.seed()
        )
    }
}

/// `(width, depth)` for additive error `epsilon` with failure probability `delta`
///
/// # Panics
///
/// Panics if `epsilon` or `delta` are not in (0, 1).
pub fn dimensions_for_error(epsilon: f64, delta: f64) -> (usize, usize) {
    assert!(epsilon > 0.0 && epsilon < 1.0, "epsilon must be in (0, 1)");
    assert!(delta > 0.0 && delta < 1.0, "delta must be in (0, 1)");

    let width = (core::f64::consts::E / epsilon).ceil() as usize;
    let depth = (1.0 / delta).ln().ceil() as usize;
    (width.max(1), depth.max(1))
}

impl Sketch for FrequencySketch {
    type Item = [u8];

    fn update(&mut self, item: &[u8]) {
        FrequencySketch::update(self, item, 1);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if !self.compatible(other) {
            return Err(MergeError::IncompatibleConfig {
                expected: self.describe(),
                found: other.describe(),
            });
        }

        let was_saturated = self.counters.is_saturated();
        self.counters.add_matrix(&other.counters);
        if !was_saturated && self.counters.is_saturated() {
            tracing::warn!(
                width = self.width(),
                depth = self.depth(),
                "count-min counter saturated during merge"
            );
        }

        self.total_count = self.total_count.saturating_add(other.total_count);
        self.num_updates += other.num_updates;
        Ok(())
    }

    fn clear(&mut self) {
        self.counters.clear();
        self.total_count = 0;
        self.num_updates = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.counters.size_bytes()
            + self.depth() * core::mem::size_of::<u64>()
    }

    fn count(&self) -> u64 {
        self.num_updates
    }
}
