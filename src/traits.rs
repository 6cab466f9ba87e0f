//! Core traits and error types shared by every summary
//!
//! Mergeable structures implement [`Sketch`]; the two quantile strategies
//! additionally implement [`RankEstimator`] so that consumers such as
//! [`RobustSpread`](crate::robust::RobustSpread) can be generic over them.

use core::borrow::Borrow;
use core::fmt::Debug;
use thiserror::Error;

/// Error during a merge of two summaries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Summaries were built with different dimensions, seeds or parameters
    #[error("incompatible config: expected {expected}, found {found}")]
    IncompatibleConfig { expected: String, found: String },
    /// Combined observation count does not fit in `u64`
    #[error("merged count overflows u64: {left} + {right}")]
    CountOverflow { left: u64, right: u64 },
}

/// Precondition violation at a query or update boundary
///
/// These are caller bugs. They are reported instead of being clamped so that
/// the bug stays visible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    /// Quantile rank outside `[0, 1]`, or NaN
    #[error("quantile must be in [0, 1], got {0}")]
    InvalidQuantile(f64),
    /// Observation weight of zero
    #[error("weight must be positive, got {0}")]
    InvalidWeight(u64),
    /// Total weight would no longer fit in `u64`
    #[error("total weight overflows u64: {count} + {weight}")]
    WeightOverflow { count: u64, weight: u64 },
    /// The estimator only tracks one quantile and another was requested
    #[error("estimator tracks quantile {tracked}, requested {requested}")]
    QuantileNotTracked { tracked: f64, requested: f64 },
    /// Constructor parameter out of range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
}

/// Reject ranks outside `[0, 1]` without clamping
pub(crate) fn check_quantile(p: f64) -> Result<f64, SketchError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(SketchError::InvalidQuantile(p))
    }
}

/// Core trait for all mergeable streaming summaries
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// Both sides must have quiesced: no `update` may run concurrently with
    /// a merge. Returns an error if the sketches are incompatible.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Apply `update` to every item, left to right
    fn update_all<I, B>(&mut self, items: I)
    where
        I: IntoIterator<Item = B>,
        B: Borrow<Self::Item>,
    {
        for item in items {
            self.update(item.borrow());
        }
    }
}

/// Approximate rank (quantile) tracking over a stream of `f64`
///
/// Implemented by [`MarkerEstimator`](crate::quantiles::MarkerEstimator),
/// which answers a single target quantile fixed at construction, and by
/// [`DigestEstimator`](crate::quantiles::DigestEstimator), which answers any.
pub trait RankEstimator: Clone + Debug {
    /// Feed one observation
    fn add(&mut self, value: f64);

    /// Estimate the value at rank `p`
    ///
    /// `Ok(None)` means there is not enough data yet.
    fn estimate(&self, p: f64) -> Result<Option<f64>, SketchError>;

    /// Number of observations fed so far
    fn observations(&self) -> u64;
}
