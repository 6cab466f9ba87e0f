//! Centroid digest quantile estimator
//!
//! A t-digest: the stream is summarised by an ordered list of weighted
//! centroids. Adjacent centroids are merged only while the arcsine scale
//! function grows by at most one across the merged cluster, so clusters stay
//! tiny near the tails and large near the median. Tail quantiles keep their
//! accuracy while memory stays bounded by roughly `compression` centroids.
//!
//! # Lazy compression
//!
//! Observations land in a buffer that is folded into the centroid list when
//! it reaches `2 × compression` entries, or on the next query. Queries take
//! `&self` and compress through a `RefCell`, so a digest is `Send` but not
//! `Sync`.

use crate::traits::{check_quantile, MergeError, RankEstimator, Sketch, SketchError};
use core::cell::RefCell;

/// Buffer high-water mark as a multiple of `compression`
const BUFFER_GROWTH: f64 = 2.0;

/// A weighted cluster of nearby observations
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Centroid {
    /// Mean value of the centroid
    pub mean: f64,
    /// Number of observations in the centroid
    pub weight: u64,
}

impl Centroid {
    /// Create a new centroid
    pub fn new(mean: f64, weight: u64) -> Self {
        Self { mean, weight }
    }

    /// Absorb another centroid, updating the weighted mean
    ///
    /// Centroid weights sum to the digest count, which is kept within `u64`.
    fn absorb(&mut self, other: &Centroid) {
        let weight = self.weight + other.weight;
        self.mean += (other.mean - self.mean) * other.weight as f64 / weight as f64;
        self.weight = weight;
    }
}

#[derive(Clone, Debug, Default)]
struct DigestInner {
    /// Centroids sorted by mean
    centroids: Vec<Centroid>,
    /// Unmerged observations
    buffer: Vec<Centroid>,
}

/// Mergeable t-digest quantile estimator
///
/// # Example
///
/// ```
/// use streamstats::quantiles::DigestEstimator;
///
/// let mut digest = DigestEstimator::new(100.0);
///
/// for i in 1..=1000 {
///     digest.update(i as f64);
/// }
///
/// let p99 = digest.quantile(0.99).unwrap().unwrap();
/// assert!((p99 - 990.0).abs() < 10.0);
///
/// // Out-of-range ranks are rejected, never clamped
/// assert!(digest.quantile(1.5).is_err());
/// ```
#[derive(Debug)]
pub struct DigestEstimator {
    compression: f64,
    inner: RefCell<DigestInner>,
    buffer_capacity: usize,
    count: u64,
    min: f64,
    max: f64,
}

impl Clone for DigestEstimator {
    fn clone(&self) -> Self {
        Self {
            compression: self.compression,
            inner: RefCell::new(self.inner.borrow().clone()),
            buffer_capacity: self.buffer_capacity,
            count: self.count,
            min: self.min,
            max: self.max,
        }
    }
}

impl Default for DigestEstimator {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl DigestEstimator {
    /// Create a digest with the given compression
    ///
    /// Higher compression keeps more centroids: more accuracy, more memory.
    /// Typical values are 100 to 500.
    ///
    /// # Panics
    ///
    /// Panics if `compression` is not finite or is below 1.
    pub fn new(compression: f64) -> Self {
        assert!(
            compression.is_finite() && compression >= 1.0,
            "compression must be finite and at least 1, got {}",
            compression
        );

        let buffer_capacity = (compression * BUFFER_GROWTH) as usize;
        Self {
            compression,
            inner: RefCell::new(DigestInner {
                centroids: Vec::with_capacity(compression as usize),
                buffer: Vec::with_capacity(buffer_capacity),
            }),
            buffer_capacity,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Compression parameter
    pub fn compression(&self) -> f64 {
        self.compression
    }

    /// Total observation weight
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of compressed centroids (excludes the pending buffer)
    pub fn num_centroids(&self) -> usize {
        self.inner.borrow().centroids.len()
    }

    /// Snapshot of the centroid list after compressing pending values
    pub fn centroids(&self) -> Vec<Centroid> {
        self.ensure_compressed();
        self.inner.borrow().centroids.clone()
    }

    /// Add one observation of unit weight
    ///
    /// NaN and infinite values are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the observation count would overflow `u64`.
    pub fn update(&mut self, value: f64) {
        if let Err(err) = self.update_weighted(value, 1) {
            panic!("digest update failed: {}", err);
        }
    }

    /// Add one observation with an explicit weight
    ///
    /// Non-finite values are ignored. A weight of zero, or one that would
    /// push the total past `u64::MAX`, is rejected and leaves the digest
    /// unchanged.
    pub fn update_weighted(&mut self, value: f64, weight: u64) -> Result<(), SketchError> {
        if weight == 0 {
            return Err(SketchError::InvalidWeight(weight));
        }
        if !value.is_finite() {
            return Ok(());
        }
        let Some(count) = self.count.checked_add(weight) else {
            return Err(SketchError::WeightOverflow {
                count: self.count,
                weight,
            });
        };

        let inner = self.inner.get_mut();
        inner.buffer.push(Centroid::new(value, weight));
        self.count = count;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if inner.buffer.len() >= self.buffer_capacity {
            Self::compress_inner(inner, self.compression);
        }
        Ok(())
    }

    /// Fold the pending buffer into the centroid list
    pub fn compress(&mut self) {
        Self::compress_inner(self.inner.get_mut(), self.compression);
    }

    fn ensure_compressed(&self) {
        if self.inner.borrow().buffer.is_empty() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        Self::compress_inner(&mut inner, self.compression);
    }

    fn compress_inner(inner: &mut DigestInner, compression: f64) {
        if inner.buffer.is_empty() {
            return;
        }

        // The centroid list is already sorted; only the buffer needs sorting
        // before a linear merge of the two runs.
        inner.buffer.sort_by(|a, b| a.mean.total_cmp(&b.mean));
        let merged = merge_sorted(&inner.centroids, &inner.buffer);
        inner.buffer.clear();

        let before = merged.len();
        inner.centroids = compress_sorted(merged, compression);

        tracing::debug!(
            before,
            after = inner.centroids.len(),
            compression,
            "compressed digest centroids"
        );
    }

    /// Smallest observation
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest observation
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Estimate the value at rank `p`
    ///
    /// Returns `Ok(None)` for an empty digest. `p` outside `[0, 1]` is a
    /// caller error.
    pub fn quantile(&self, p: f64) -> Result<Option<f64>, SketchError> {
        let p = check_quantile(p)?;
        if self.count == 0 {
            return Ok(None);
        }

        self.ensure_compressed();
        let inner = self.inner.borrow();
        Ok(Some(quantile_of(
            &inner.centroids,
            self.count,
            self.min,
            self.max,
            p,
        )))
    }

    /// Median estimate
    pub fn median(&self) -> Option<f64> {
        self.quantile(0.5).ok().flatten()
    }

    /// Estimated fraction of observations `<= value`
    ///
    /// `0.0` for an empty digest.
    pub fn rank(&self, value: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.ensure_compressed();
        let inner = self.inner.borrow();
        rank_of(&inner.centroids, self.count, self.min, self.max, value)
    }

    /// Alias of [`rank`](Self::rank)
    pub fn cdf(&self, value: f64) -> f64 {
        self.rank(value)
    }

    fn is_compatible(&self, other: &Self) -> bool {
        let avg = (self.compression + other.compression) * 0.5;
        (self.compression - other.compression).abs() / avg <= 1e-6
    }
}

/// Linear merge of two runs sorted by mean
fn merge_sorted(a: &[Centroid], b: &[Centroid]) -> Vec<Centroid> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].mean <= b[j].mean {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Arcsine scale function `k(q) = δ · (asin(2q - 1) / π + 1/2)`
#[inline]
fn scale(q: f64, compression: f64) -> f64 {
    let x = (2.0 * q - 1.0).clamp(-1.0, 1.0);
    compression * (x.asin() / core::f64::consts::PI + 0.5)
}

/// Greedy merge of adjacent centroids under the scale-function bound
fn compress_sorted(sorted: Vec<Centroid>, compression: f64) -> Vec<Centroid> {
    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(compression as usize);
    let total: u64 = current.weight + iter.as_slice().iter().map(|c| c.weight).sum::<u64>();
    let total = total as f64;
    let mut weight_before = 0u64;

    for next in iter {
        let q0 = weight_before as f64 / total;
        let q1 = (weight_before + current.weight + next.weight) as f64 / total;

        if scale(q1, compression) - scale(q0, compression) <= 1.0 {
            current.absorb(&next);
        } else {
            weight_before += current.weight;
            out.push(current);
            current = next;
        }
    }
    out.push(current);
    out
}

/// Walk the centroid list to rank `p · count` and interpolate
///
/// The CDF is modelled as piecewise linear through each centroid's midpoint
/// `(weight_before + weight / 2, mean)`, anchored at `(0, min)` and
/// `(count, max)`.
fn quantile_of(centroids: &[Centroid], count: u64, min: f64, max: f64, p: f64) -> f64 {
    if p <= 0.0 {
        return min;
    }
    if p >= 1.0 {
        return max;
    }

    let target = p * count as f64;
    let mut prev_rank = 0.0;
    let mut prev_mean = min;
    let mut cumulative = 0.0;

    for c in centroids {
        let mid = cumulative + c.weight as f64 / 2.0;
        if target < mid {
            let span = mid - prev_rank;
            if span <= 0.0 {
                return prev_mean;
            }
            return prev_mean + (target - prev_rank) / span * (c.mean - prev_mean);
        }
        cumulative += c.weight as f64;
        prev_rank = mid;
        prev_mean = c.mean;
    }

    let span = count as f64 - prev_rank;
    if span <= 0.0 {
        return max;
    }
    prev_mean + (target - prev_rank) / span * (max - prev_mean)
}

/// Inverse of [`quantile_of`] over the same piecewise-linear model
fn rank_of(centroids: &[Centroid], count: u64, min: f64, max: f64, value: f64) -> f64 {
    // >= max first so that a constant stream reports 1.0 at its value
    if value >= max {
        return 1.0;
    }
    if value <= min {
        return 0.0;
    }

    let n = count as f64;
    let mut prev_rank = 0.0;
    let mut prev_mean = min;
    let mut cumulative = 0.0;

    for c in centroids {
        let mid = cumulative + c.weight as f64 / 2.0;
        if value < c.mean {
            let span = c.mean - prev_mean;
            if span <= 0.0 {
                return prev_rank / n;
            }
            return (prev_rank + (value - prev_mean) / span * (mid - prev_rank)) / n;
        }
        cumulative += c.weight as f64;
        prev_rank = mid;
        prev_mean = c.mean;
    }

    let span = max - prev_mean;
    if span <= 0.0 {
        return 1.0;
    }
    (prev_rank + (value - prev_mean) / span * (n - prev_rank)) / n
}

impl Sketch for DigestEstimator {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        DigestEstimator::update(self, *item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if !self.is_compatible(other) {
            return Err(MergeError::IncompatibleConfig {
                expected: format!("compression={}", self.compression),
                found: format!("compression={}", other.compression),
            });
        }
        if other.count == 0 {
            return Ok(());
        }
        let Some(count) = self.count.checked_add(other.count) else {
            return Err(MergeError::CountOverflow {
                left: self.count,
                right: other.count,
            });
        };

        let compression = self.compression;
        let inner = self.inner.get_mut();
        {
            let theirs = other.inner.borrow();
            inner.buffer.extend_from_slice(&theirs.centroids);
            inner.buffer.extend_from_slice(&theirs.buffer);
        }
        Self::compress_inner(inner, compression);

        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }

    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.centroids.clear();
        inner.buffer.clear();
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn size_bytes(&self) -> usize {
        let inner = self.inner.borrow();
        core::mem::size_of::<Self>()
            + (inner.centroids.capacity() + inner.buffer.capacity())
                * core::mem::size_of::<Centroid>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl RankEstimator for DigestEstimator {
    fn add(&mut self, value: f64) {
        self.update(value);
    }

    fn estimate(&self, p: f64) -> Result<Option<f64>, SketchError> {
        self.quantile(p)
    }

    fn observations(&self) -> u64 {
        self.count
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for DigestEstimator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        self.ensure_compressed();
        let inner = self.inner.borrow();
        let mut state = serializer.serialize_struct("DigestEstimator", 5)?;
        state.serialize_field("compression", &self.compression)?;
        state.serialize_field("centroids", &inner.centroids)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("min", &self.min)?;
        state.serialize_field("max", &self.max)?;
        state.end()
    }
}
