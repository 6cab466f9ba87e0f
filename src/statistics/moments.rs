//! Online moments (mean, variance, skewness, kurtosis)
//!
//! Single-pass accumulation of the first four central moments using
//! Welford's delta update extended to higher orders, and the pairwise
//! pooling formulas of Chan et al. / Pébay for merging shards.

use crate::traits::{MergeError, Sketch};

/// Streaming accumulator for the first four central moments
///
/// Holds `count`, the running mean, and the central sums
/// `M2 = Σ(x-μ)²`, `M3 = Σ(x-μ)³`, `M4 = Σ(x-μ)⁴`, updated in O(1) per value.
/// Computing the mean through `mean += (x - mean) / n` avoids the
/// catastrophic cancellation of `Σx² - (Σx)²/n`.
///
/// Readers never panic. Below the minimum count a statistic needs
/// (2 for variance, 3 for skewness, 4 for kurtosis) they return `0.0`.
///
/// # Example
///
/// ```
/// use streamstats::statistics::MomentAccumulator;
///
/// let mut acc = MomentAccumulator::new();
///
/// for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.update(value);
/// }
///
/// assert!((acc.mean() - 5.0).abs() < 1e-12);
/// assert!((acc.variance() - 4.0).abs() < 1e-12);
/// assert!((acc.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
/// assert_eq!(acc.min(), Some(2.0));
/// ```
///
/// # Distributed Usage
///
/// ```
/// use streamstats::statistics::MomentAccumulator;
/// use streamstats::traits::Sketch;
///
/// let mut left = MomentAccumulator::new();
/// let mut right = MomentAccumulator::new();
///
/// left.extend([1.0, 2.0, 3.0]);
/// right.extend([4.0, 5.0, 6.0]);
///
/// left.merge(&right).unwrap();
/// assert!((left.mean() - 3.5).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MomentAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
}

impl Default for MomentAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add one observation
    ///
    /// NaN and infinite values are ignored so that they cannot poison the
    /// moments.
    ///
    /// # Panics
    ///
    /// Panics if the observation count would overflow `u64`.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        let Some(count) = self.count.checked_add(1) else {
            panic!("moment accumulator count overflowed u64");
        };

        let n1 = self.count as f64;
        let n = count as f64;
        let delta = value - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;

        // M4 and M3 read the previous M2/M3, so update highest order first
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
        self.mean += delta_n;
        self.count = count;

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Add every value of an iterator, in order
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for value in values {
            self.update(value);
        }
    }

    /// Number of observations
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Arithmetic mean, `0.0` when empty
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Population variance `M2 / n`, `0.0` below two observations
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Sample variance `M2 / (n - 1)` (Bessel's correction), `0.0` below two observations
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Population standard deviation
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Sample standard deviation
    pub fn sample_stddev(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    /// Population skewness `√n · M3 / M2^{3/2}`
    ///
    /// `0.0` below three observations or when all values are equal.
    pub fn skewness(&self) -> f64 {
        if self.count < 3 || self.m2 <= 0.0 {
            return 0.0;
        }
        let n = self.count as f64;
        n.sqrt() * self.m3 / self.m2.powf(1.5)
    }

    /// Excess kurtosis `n · M4 / M2² - 3` (0 for a normal distribution)
    ///
    /// `0.0` below four observations or when all values are equal.
    pub fn kurtosis(&self) -> f64 {
        if self.count < 4 || self.m2 <= 0.0 {
            return 0.0;
        }
        let n = self.count as f64;
        n * self.m4 / (self.m2 * self.m2) - 3.0
    }

    /// Smallest observation
    pub fn min(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.min)
        }
    }

    /// Largest observation
    pub fn max(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.max)
        }
    }

    /// Sum of all observations
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Fold another accumulator into this one
    ///
    /// The result matches one-pass accumulation of the concatenated streams
    /// within floating-point tolerance.
    ///
    /// # Panics
    ///
    /// Panics if the combined count would overflow `u64`. The [`Sketch`]
    /// merge reports that case as an error instead.
    pub fn merge_moments(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if !(other.mean.is_finite() && other.m2.is_finite()) {
            tracing::warn!(
                count = other.count,
                mean = other.mean,
                "merging moment accumulator with non-finite moments"
            );
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let Some(count) = self.count.checked_add(other.count) else {
            panic!("moment accumulator count overflowed u64");
        };

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = count as f64;
        let delta = other.mean - self.mean;
        let delta2 = delta * delta;
        let delta3 = delta * delta2;
        let delta4 = delta2 * delta2;

        let m2 = self.m2 + other.m2 + delta2 * na * nb / n;
        let m3 = self.m3
            + other.m3
            + delta3 * na * nb * (na - nb) / (n * n)
            + 3.0 * delta * (na * other.m2 - nb * self.m2) / n;
        let m4 = self.m4
            + other.m4
            + delta4 * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
            + 6.0 * delta2 * (na * na * other.m2 + nb * nb * self.m2) / (n * n)
            + 4.0 * delta * (na * other.m3 - nb * self.m3) / n;

        self.mean += delta * nb / n;
        self.m2 = m2;
        self.m3 = m3;
        self.m4 = m4;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

impl Sketch for MomentAccumulator {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        MomentAccumulator::update(self, *item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.count.checked_add(other.count).is_none() {
            return Err(MergeError::CountOverflow {
                left: self.count,
                right: other.count,
            });
        }
        self.merge_moments(other);
        Ok(())
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pass(values: &[f64]) -> (f64, f64, f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let m2: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let m3: f64 = values.iter().map(|v| (v - mean).powi(3)).sum();
        let m4: f64 = values.iter().map(|v| (v - mean).powi(4)).sum();
        let var = m2 / n;
        let skew = n.sqrt() * m3 / m2.powf(1.5);
        let kurt = n * m4 / (m2 * m2) - 3.0;
        (mean, var, skew, kurt)
    }

    #[test]
    fn test_basic() {
        let mut acc = MomentAccumulator::new();
        acc.extend([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);

        assert_eq!(acc.len(), 8);
        assert!((acc.mean() - 5.0).abs() < 1e-12);
        assert!((acc.variance() - 4.0).abs() < 1e-12);
        assert!((acc.stddev() - 2.0).abs() < 1e-12);
        assert!((acc.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(acc.min(), Some(2.0));
        assert_eq!(acc.max(), Some(9.0));
        assert!((acc.sum() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_higher_moments_match_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut acc = MomentAccumulator::new();
        acc.extend(values);

        let (_, _, skew, kurt) = two_pass(&values);
        assert!((acc.skewness() - skew).abs() < 1e-12, "{}", acc.skewness());
        assert!((acc.kurtosis() - kurt).abs() < 1e-12, "{}", acc.kurtosis());
    }

    #[test]
    fn test_symmetric_data_has_zero_skew() {
        let mut acc = MomentAccumulator::new();
        acc.extend([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(acc.skewness().abs() < 1e-12);
        // Uniform discrete on 5 points: excess kurtosis = -1.3
        assert!((acc.kurtosis() + 1.3).abs() < 1e-12, "{}", acc.kurtosis());
    }

    #[test]
    fn test_sentinels_below_minimum_count() {
        let mut acc = MomentAccumulator::new();
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.variance(), 0.0);
        assert_eq!(acc.min(), None);

        acc.update(3.0);
        assert_eq!(acc.mean(), 3.0);
        assert_eq!(acc.variance(), 0.0);
        assert_eq!(acc.sample_variance(), 0.0);

        acc.update(5.0);
        assert!((acc.variance() - 1.0).abs() < 1e-12);
        assert_eq!(acc.skewness(), 0.0);

        acc.update(10.0);
        assert!(acc.skewness() != 0.0);
        assert_eq!(acc.kurtosis(), 0.0);

        acc.update(11.0);
        assert!(acc.kurtosis() != 0.0);
    }

    #[test]
    fn test_constant_stream_has_no_nan() {
        let mut acc = MomentAccumulator::new();
        for _ in 0..100 {
            acc.update(7.5);
        }
        assert_eq!(acc.variance(), 0.0);
        assert_eq!(acc.skewness(), 0.0);
        assert_eq!(acc.kurtosis(), 0.0);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let data: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64 * 0.5 - 3.0).collect();

        let mut whole = MomentAccumulator::new();
        whole.extend(data.iter().copied());

        let mut left = MomentAccumulator::new();
        let mut right = MomentAccumulator::new();
        left.extend(data[..73].iter().copied());
        right.extend(data[73..].iter().copied());
        left.merge(&right).unwrap();

        assert_eq!(left.len(), whole.len());
        assert!((left.mean() - whole.mean()).abs() < 1e-10);
        assert!((left.variance() - whole.variance()).abs() < 1e-9);
        assert!((left.skewness() - whole.skewness()).abs() < 1e-9);
        assert!((left.kurtosis() - whole.kurtosis()).abs() < 1e-9);
        assert_eq!(left.min(), whole.min());
        assert_eq!(left.max(), whole.max());
    }

    #[test]
    fn test_merge_empty() {
        let mut acc = MomentAccumulator::new();
        acc.extend([1.0, 2.0]);
        let before = acc.clone();

        acc.merge(&MomentAccumulator::new()).unwrap();
        assert_eq!(acc, before);

        let mut empty = MomentAccumulator::new();
        empty.merge(&before).unwrap();
        assert_eq!(empty, before);
    }

    #[test]
    fn test_numerical_stability() {
        let mut acc = MomentAccumulator::new();
        let base = 1e9;
        for i in 0..10_000 {
            acc.update(base + (i % 4) as f64);
        }
        // Values 0,1,2,3 shifted: variance 1.25
        assert!((acc.mean() - (base + 1.5)).abs() < 1e-6);
        assert!((acc.variance() - 1.25).abs() < 1e-6, "{}", acc.variance());
    }

    #[test]
    fn test_nan_ignored() {
        let mut acc = MomentAccumulator::new();
        acc.extend([1.0, f64::NAN, 2.0, f64::NAN, 3.0]);
        assert_eq!(acc.len(), 3);
        assert!((acc.mean() - 2.0).abs() < 1e-12);
        assert!(!acc.variance().is_nan());
    }

    #[test]
    fn test_infinities_ignored() {
        let mut acc = MomentAccumulator::new();
        acc.extend([1.0, f64::INFINITY, 2.0, f64::NEG_INFINITY, 3.0]);
        assert_eq!(acc.len(), 3);
        assert!((acc.mean() - 2.0).abs() < 1e-12);
        assert!((acc.variance() - 2.0 / 3.0).abs() < 1e-12);
        assert!(acc.skewness().abs() < 1e-12);
        assert!(acc.kurtosis().is_finite());
        assert_eq!(acc.max(), Some(3.0));
    }

    #[test]
    fn test_merge_count_overflow() {
        let mut big = MomentAccumulator {
            count: u64::MAX - 1,
            mean: 1.0,
            ..MomentAccumulator::new()
        };
        let mut other = MomentAccumulator::new();
        other.extend([1.0, 2.0]);

        assert_eq!(
            big.merge(&other),
            Err(MergeError::CountOverflow {
                left: u64::MAX - 1,
                right: 2
            })
        );
        assert_eq!(big.len(), u64::MAX - 1);
    }

    #[test]
    fn test_clear() {
        let mut acc = MomentAccumulator::new();
        acc.extend([1.0, 2.0, 3.0]);
        Sketch::clear(&mut acc);
        assert!(acc.is_empty());
        assert_eq!(acc.max(), None);
    }
}
