//! Exact low-order moments over a stream
//!
//! This module provides single-pass, constant-memory moment accumulation.
//!
//! # Example
//!
//! ```
//! use streamstats::statistics::MomentAccumulator;
//!
//! let mut acc = MomentAccumulator::new();
//!
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     acc.update(value);
//! }
//!
//! println!("Mean: {}", acc.mean());
//! println!("Stddev: {}", acc.stddev());
//! println!("Skewness: {}", acc.skewness());
//! println!("Excess kurtosis: {}", acc.kurtosis());
//! ```

mod moments;

pub use moments::MomentAccumulator;
