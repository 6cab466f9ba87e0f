//! Set membership
//!
//! A Bloom filter trades a bounded false-positive rate for a fixed memory
//! footprint. It never reports an inserted key as absent.
//!
//! # Example
//!
//! ```
//! use streamstats::membership::MembershipFilter;
//!
//! let mut filter = MembershipFilter::with_rate(10_000, 0.01);
//! filter.insert("hello");
//! assert!(filter.possibly_contains("hello"));
//! ```

mod bits;
mod bloom;

pub use bits::BitArray;
pub use bloom::{false_positive_rate, optimal_dimensions, MembershipFilter};
