//! Robust spread measures
//!
//! Interquartile range, Tukey outlier fences and an approximate median
//! absolute deviation, all derived from
//! [`RankEstimator`](crate::traits::RankEstimator)s.
//!
//! # Example
//!
//! ```
//! use streamstats::robust::RobustSpread;
//!
//! let mut spread = RobustSpread::with_markers(512);
//!
//! for value in [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 95.0, 12.0] {
//!     spread.update(value);
//! }
//!
//! println!("IQR: {:?}", spread.iqr());
//! println!("MAD (approx.): {:?}", spread.mad());
//! println!("95 is an outlier: {}", spread.is_outlier(95.0));
//! ```

mod spread;

pub use spread::{RobustSpread, MAD_SCALE, TUKEY_K};
