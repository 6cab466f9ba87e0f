//! Frequency estimation and heavy hitters
//!
//! - [`FrequencySketch`]: Count-Min with an optional conservative-update
//!   policy; never under-counts
//! - [`HeavyHitterTracker`]: top-K keys over a Count-Min sketch
//!
//! Storage ([`CounterMatrix`]) is kept apart from hashing and from the
//! update policy.
//!
//! # Example
//!
//! ```
//! use streamstats::frequency::{FrequencySketch, UpdatePolicy};
//!
//! let mut cms = FrequencySketch::with_error(0.01, 0.001)
//!     .with_policy(UpdatePolicy::Conservative);
//!
//! cms.update("item1", 5);
//! cms.update("item2", 3);
//!
//! println!("Estimated count: {}", cms.estimate("item1"));
//! ```

mod count_min;
mod counters;
mod heavy_hitters;

pub use count_min::{dimensions_for_error, FrequencySketch, UpdatePolicy};
pub use counters::CounterMatrix;
pub use heavy_hitters::HeavyHitterTracker;
