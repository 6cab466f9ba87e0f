//! Approximate rank (quantile) estimation
//!
//! Two interchangeable strategies implement
//! [`RankEstimator`](crate::traits::RankEstimator):
//!
//! - [`MarkerEstimator`]: P² five-marker estimator, O(1) memory, one target
//!   quantile fixed at construction
//! - [`DigestEstimator`]: t-digest, O(compression) memory, any quantile,
//!   mergeable, accurate at the tails
//!
//! Both are path dependent: feeding the same values in a different order can
//! give slightly different (but distributionally equivalent) estimates.
//!
//! # Example
//!
//! ```
//! use streamstats::quantiles::{DigestEstimator, MarkerEstimator};
//!
//! let mut digest = DigestEstimator::new(100.0);
//! let mut median = MarkerEstimator::median();
//!
//! for value in 1..=100 {
//!     digest.update(value as f64);
//!     median.update(value as f64);
//! }
//!
//! println!("p95: {:?}", digest.quantile(0.95));
//! println!("median: {:?}", median.quantile());
//! ```

mod digest;
mod marker;

pub use digest::{Centroid, DigestEstimator};
pub use marker::{MarkerEstimator, MIN_SAMPLES};
