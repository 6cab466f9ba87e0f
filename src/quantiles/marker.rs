//! P² single-quantile estimator
//!
//! Implementation of the Jain & Chlamtac P² algorithm: five markers whose
//! heights track the minimum, `p/2`, `p`, `(1+p)/2` quantiles and the maximum.
//! After each observation the interior markers are nudged toward their
//! desired positions with a piecewise-parabolic prediction, falling back to
//! linear interpolation when the parabola would leave the neighbour bracket.
//!
//! Memory is O(1) regardless of stream length.

use crate::traits::{check_quantile, RankEstimator, SketchError};

const MARKERS: usize = 5;

/// Observations a [`MarkerEstimator`] needs before it reports an estimate
pub const MIN_SAMPLES: usize = MARKERS;

/// Marker arrays once the estimator is tracking
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Markers {
    /// Marker heights (quantile estimates), non-decreasing
    heights: [f64; MARKERS],
    /// Actual marker positions (0-based ranks), strictly increasing
    positions: [f64; MARKERS],
    /// Desired marker positions
    desired: [f64; MARKERS],
}

impl Markers {
    fn from_sorted(heights: [f64; MARKERS], p: f64) -> Self {
        Self {
            heights,
            positions: [0.0, 1.0, 2.0, 3.0, 4.0],
            desired: [0.0, 2.0 * p, 4.0 * p, 2.0 + 2.0 * p, 4.0],
        }
    }

    fn observe(&mut self, value: f64, increments: &[f64; MARKERS]) {
        let h = &mut self.heights;

        // Cell k such that heights[k] <= value < heights[k + 1]
        let cell = if value < h[0] {
            h[0] = value;
            0
        } else if value >= h[MARKERS - 1] {
            h[MARKERS - 1] = value;
            MARKERS - 2
        } else {
            h[1..]
                .iter()
                .position(|&q| value < q)
                .unwrap_or(MARKERS - 2)
        };

        for position in &mut self.positions[cell + 1..] {
            *position += 1.0;
        }
        for (desired, inc) in self.desired.iter_mut().zip(increments) {
            *desired += inc;
        }

        for i in 1..MARKERS - 1 {
            let drift = self.desired[i] - self.positions[i];
            let room_above = self.positions[i + 1] - self.positions[i];
            let room_below = self.positions[i - 1] - self.positions[i];

            if (drift >= 1.0 && room_above > 1.0) || (drift <= -1.0 && room_below < -1.0) {
                let step = drift.signum();
                let candidate = self.parabolic(i, step);
                // Parabolic step must land strictly between the neighbours
                self.heights[i] = if self.heights[i - 1] < candidate
                    && candidate < self.heights[i + 1]
                {
                    candidate
                } else {
                    self.linear(i, step)
                };
                self.positions[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, step: f64) -> f64 {
        let (q, n) = (&self.heights, &self.positions);
        q[i] + step / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + step) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - step) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, step: f64) -> f64 {
        let j = if step > 0.0 { i + 1 } else { i - 1 };
        let (q, n) = (&self.heights, &self.positions);
        q[i] + step * (q[j] - q[i]) / (n[j] - n[i])
    }
}

/// Filling → Tracking; the transition is one-way
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum State {
    /// Fewer than five observations: raw values buffered
    Filling { buffer: [f64; MARKERS], len: usize },
    /// Five or more observations: marker adjustment
    Tracking(Markers),
}

/// Five-marker P² estimator for one target quantile
///
/// The first five observations are buffered and sorted once (stable, so
/// ties keep arrival order); from the fifth observation on the estimator
/// tracks. [`quantile`](Self::quantile) returns `None` until then.
///
/// # Example
///
/// ```
/// use streamstats::quantiles::MarkerEstimator;
///
/// let mut p90 = MarkerEstimator::new(0.9).unwrap();
///
/// for i in 0..4 {
///     p90.update(i as f64);
/// }
/// assert_eq!(p90.quantile(), None); // still filling
///
/// for i in 4..1000 {
///     p90.update(i as f64);
/// }
/// let estimate = p90.quantile().unwrap();
/// assert!((estimate - 900.0).abs() < 20.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarkerEstimator {
    /// Target quantile in (0, 1)
    p: f64,
    /// Desired-position increments per observation
    increments: [f64; MARKERS],
    state: State,
    count: u64,
}

impl MarkerEstimator {
    /// Create an estimator for quantile `p`
    ///
    /// `p` must lie strictly inside `(0, 1)`; the extremes are not
    /// representable by a middle marker.
    pub fn new(p: f64) -> Result<Self, SketchError> {
        if !(p > 0.0 && p < 1.0) {
            return Err(SketchError::InvalidParameter {
                name: "p",
                reason: format!("target quantile must be in (0, 1), got {}", p),
            });
        }

        Ok(Self::for_target(p))
    }

    /// Estimator for the median
    pub fn median() -> Self {
        Self::for_target(0.5)
    }

    /// Build without validating `p`; callers pass constants in (0, 1)
    pub(crate) fn for_target(p: f64) -> Self {
        debug_assert!(p > 0.0 && p < 1.0);
        Self {
            p,
            increments: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
            state: State::Filling {
                buffer: [0.0; MARKERS],
                len: 0,
            },
            count: 0,
        }
    }

    /// Target quantile
    pub fn target(&self) -> f64 {
        self.p
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the estimator has left the filling phase
    pub fn is_tracking(&self) -> bool {
        matches!(self.state, State::Tracking(_))
    }

    /// Add one observation
    ///
    /// NaN and infinite values are ignored.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        let filled = match &mut self.state {
            State::Filling { buffer, len } => {
                buffer[*len] = value;
                *len += 1;
                (*len == MARKERS).then_some(*buffer)
            }
            State::Tracking(markers) => {
                markers.observe(value, &self.increments);
                None
            }
        };

        if let Some(mut heights) = filled {
            heights.sort_by(|a, b| a.total_cmp(b));
            self.state = State::Tracking(Markers::from_sorted(heights, self.p));
        }
    }

    /// Current estimate of the target quantile
    ///
    /// `None` while fewer than five observations have been seen.
    pub fn quantile(&self) -> Option<f64> {
        match &self.state {
            State::Filling { .. } => None,
            State::Tracking(markers) => Some(markers.heights[2]),
        }
    }

    /// Smallest observation once tracking
    pub fn min(&self) -> Option<f64> {
        self.marker_heights().map(|h| h[0])
    }

    /// Largest observation once tracking
    pub fn max(&self) -> Option<f64> {
        self.marker_heights().map(|h| h[MARKERS - 1])
    }

    /// Marker heights, once tracking
    pub fn marker_heights(&self) -> Option<&[f64; MARKERS]> {
        match &self.state {
            State::Filling { .. } => None,
            State::Tracking(markers) => Some(&markers.heights),
        }
    }

    /// Marker positions (0-based ranks), once tracking
    pub fn marker_positions(&self) -> Option<&[f64; MARKERS]> {
        match &self.state {
            State::Filling { .. } => None,
            State::Tracking(markers) => Some(&markers.positions),
        }
    }
}

impl RankEstimator for MarkerEstimator {
    fn add(&mut self, value: f64) {
        self.update(value);
    }

    fn estimate(&self, p: f64) -> Result<Option<f64>, SketchError> {
        let p = check_quantile(p)?;
        if (p - self.p).abs() > 1e-12 {
            return Err(SketchError::QuantileNotTracked {
                tracked: self.p,
                requested: p,
            });
        }
        Ok(self.quantile())
    }

    fn observations(&self) -> u64 {
        self.count
    }
}
