//! Interquartile range, median absolute deviation and Tukey outliers

use crate::quantiles::{DigestEstimator, MarkerEstimator, MIN_SAMPLES};
use crate::traits::RankEstimator;
use std::collections::VecDeque;

/// Scale that makes the MAD a consistent estimator of the standard
/// deviation under Gaussian noise (`1 / Φ⁻¹(3/4)`)
pub const MAD_SCALE: f64 = 1.4826;

/// Tukey fence multiplier
pub const TUKEY_K: f64 = 1.5;

const Q1: f64 = 0.25;
const MEDIAN: f64 = 0.5;
const Q3: f64 = 0.75;

/// Robust spread statistics derived from rank estimators
///
/// Quartiles come from two independent [`RankEstimator`]s updated on every
/// observation, and a third one tracks the running median.
///
/// # MAD is an approximation
///
/// An exact median absolute deviation over an unbounded stream cannot be
/// computed in bounded memory, because every deviation depends on the final
/// median. [`mad`](Self::mad) instead keeps the most recent `window` values,
/// measures their deviations from the *current* median estimate, and feeds
/// those into a fresh rank estimator. Under a stationary stream this tracks
/// the true MAD; under drift it reflects the recent window only.
///
/// # Example
///
/// ```
/// use streamstats::robust::RobustSpread;
///
/// let mut spread = RobustSpread::with_digests(100.0, 1024);
///
/// for i in 1..=1000 {
///     spread.update(i as f64);
/// }
///
/// let iqr = spread.iqr().unwrap();
/// assert!((iqr - 500.0).abs() < 20.0);
/// assert!(spread.is_outlier(5000.0));
/// assert!(!spread.is_outlier(500.0));
/// ```
#[derive(Clone, Debug)]
pub struct RobustSpread<E: RankEstimator> {
    lower: E,
    upper: E,
    median: E,
    /// Empty estimator cloned for each MAD computation
    deviations: E,
    window: VecDeque<f64>,
    window_capacity: usize,
    count: u64,
}

impl RobustSpread<MarkerEstimator> {
    /// O(1) quartiles using P² markers, plus a MAD window of `window` values
    ///
    /// # Panics
    ///
    /// Panics if `window` is smaller than [`MIN_SAMPLES`]: the deviation
    /// markers would never leave their filling phase.
    pub fn with_markers(window: usize) -> Self {
        assert!(
            window >= MIN_SAMPLES,
            "MAD window must hold at least {} values for P² markers, got {}",
            MIN_SAMPLES,
            window
        );
        Self::from_estimators(
            MarkerEstimator::for_target(Q1),
            MarkerEstimator::for_target(Q3),
            MarkerEstimator::median(),
            MarkerEstimator::median(),
            window,
        )
    }
}

impl RobustSpread<DigestEstimator> {
    /// Quartiles from t-digests of the given compression, plus a MAD
    /// window of `window` values
    ///
    /// # Panics
    ///
    /// Panics if `window` is 0 or `compression` is invalid.
    pub fn with_digests(compression: f64, window: usize) -> Self {
        Self::from_estimators(
            DigestEstimator::new(compression),
            DigestEstimator::new(compression),
            DigestEstimator::new(compression),
            DigestEstimator::new(compression),
            window,
        )
    }
}

impl<E: RankEstimator> RobustSpread<E> {
    /// Assemble from explicit estimators
    ///
    /// `lower`, `upper` and `median` must answer ranks 0.25, 0.75 and 0.5;
    /// `deviations` must be empty and answer rank 0.5.
    ///
    /// # Panics
    ///
    /// Panics if `window` is 0.
    pub fn from_estimators(lower: E, upper: E, median: E, deviations: E, window: usize) -> Self {
        assert!(window > 0, "MAD window must be positive");

        Self {
            lower,
            upper,
            median,
            deviations,
            window: VecDeque::with_capacity(window),
            window_capacity: window,
            count: 0,
        }
    }

    /// Add one observation
    ///
    /// NaN and infinite values are ignored.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.count += 1;
        self.lower.add(value);
        self.upper.add(value);
        self.median.add(value);

        if self.window.len() == self.window_capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Size of the MAD window
    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }

    /// First and third quartile estimates
    pub fn quartiles(&self) -> Option<(f64, f64)> {
        let q1 = self.lower.estimate(Q1).ok().flatten()?;
        let q3 = self.upper.estimate(Q3).ok().flatten()?;
        Some((q1, q3))
    }

    /// Running median estimate
    pub fn median(&self) -> Option<f64> {
        self.median.estimate(MEDIAN).ok().flatten()
    }

    /// Interquartile range `Q3 - Q1`
    ///
    /// Independent estimators can cross by a rounding hair on degenerate
    /// input; the result is floored at zero.
    pub fn iqr(&self) -> Option<f64> {
        self.quartiles().map(|(q1, q3)| (q3 - q1).max(0.0))
    }

    /// Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`
    pub fn fences(&self) -> Option<(f64, f64)> {
        let (q1, q3) = self.quartiles()?;
        let iqr = (q3 - q1).max(0.0);
        Some((q1 - TUKEY_K * iqr, q3 + TUKEY_K * iqr))
    }

    /// Whether `value` falls outside the Tukey fences
    ///
    /// Always `false` until the quartiles are available.
    pub fn is_outlier(&self, value: f64) -> bool {
        match self.fences() {
            Some((low, high)) => value < low || value > high,
            None => false,
        }
    }

    /// Approximate median absolute deviation, scaled by [`MAD_SCALE`]
    ///
    /// Computed over the recent window only; see the type-level docs.
    /// `None` until the median and the deviation estimator have enough data.
    pub fn mad(&self) -> Option<f64> {
        let median = self.median()?;

        let mut deviations = self.deviations.clone();
        for &v in &self.window {
            deviations.add((v - median).abs());
        }

        deviations
            .estimate(MEDIAN)
            .ok()
            .flatten()
            .map(|d| d * MAD_SCALE)
    }
}
