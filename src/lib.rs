//! # streamstats
//!
//! Bounded-memory streaming statistics for Rust.
//!
//! Every summary ingests an unbounded, single-pass stream and answers
//! queries in O(1) or O(k) memory:
//!
//! - **Moments**: exact mean, variance, skewness and kurtosis (Welford)
//! - **Quantiles**: P² markers for one fixed quantile, t-digest for any
//! - **Robust spread**: IQR, Tukey outlier fences, approximate MAD
//! - **Membership**: Bloom filter, no false negatives
//! - **Frequency**: Count-Min sketch, never under-counts
//! - **Heavy hitters**: top-K over Count-Min
//! - **Sharding**: parallel ingestion with a deterministic merge
//!
//! ## Quick Start
//!
//! ```rust
//! use streamstats::prelude::*;
//!
//! let mut moments = MomentAccumulator::new();
//! let mut digest = DigestEstimator::new(100.0);
//!
//! for latency_ms in [12.0, 15.0, 11.0, 240.0, 13.0, 14.0] {
//!     moments.update(latency_ms);
//!     digest.update(latency_ms);
//! }
//!
//! println!("mean: {:.1}", moments.mean());
//! println!("p99:  {:?}", digest.quantile(0.99).unwrap());
//! ```
//!
//! ## Merging
//!
//! Every summary implements [`Sketch`](traits::Sketch), whose `merge`
//! combines summaries built over disjoint parts of a stream:
//!
//! ```rust
//! use streamstats::frequency::FrequencySketch;
//! use streamstats::traits::Sketch;
//!
//! let mut worker1 = FrequencySketch::new(1024, 4);
//! let mut worker2 = FrequencySketch::new(1024, 4);
//!
//! worker1.update("user_a", 1);
//! worker2.update("user_a", 2);
//!
//! worker1.merge(&worker2).unwrap();
//! assert!(worker1.estimate("user_a") >= 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `statistics` (default): moment accumulator
//! - `quantiles` (default): P² and t-digest
//! - `robust` (default): IQR, MAD, outliers (implies `quantiles`)
//! - `membership` (default): Bloom filter
//! - `frequency` (default): Count-Min and top-K
//! - `parallel` (default): rayon-backed sharded aggregation
//! - `serde`: serialization of summaries and configuration
//! - `full`: everything above
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (digest compression, shard folds,
//! counter saturation) and never installs a subscriber.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod hash;
pub mod traits;

#[cfg(feature = "statistics")]
#[cfg_attr(docsrs, doc(cfg(feature = "statistics")))]
pub mod statistics;

#[cfg(feature = "quantiles")]
#[cfg_attr(docsrs, doc(cfg(feature = "quantiles")))]
pub mod quantiles;

#[cfg(feature = "robust")]
#[cfg_attr(docsrs, doc(cfg(feature = "robust")))]
pub mod robust;

#[cfg(feature = "membership")]
#[cfg_attr(docsrs, doc(cfg(feature = "membership")))]
pub mod membership;

#[cfg(feature = "frequency")]
#[cfg_attr(docsrs, doc(cfg(feature = "frequency")))]
pub mod frequency;

#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
pub mod parallel;

pub mod prelude {
    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::hash::HashFamily;
    pub use crate::traits::*;

    #[cfg(feature = "statistics")]
    pub use crate::statistics::MomentAccumulator;

    #[cfg(feature = "quantiles")]
    pub use crate::quantiles::{DigestEstimator, MarkerEstimator};

    #[cfg(feature = "robust")]
    pub use crate::robust::RobustSpread;

    #[cfg(feature = "membership")]
    pub use crate::membership::MembershipFilter;

    #[cfg(feature = "frequency")]
    pub use crate::frequency::{FrequencySketch, HeavyHitterTracker, UpdatePolicy};

    #[cfg(feature = "parallel")]
    pub use crate::parallel::ShardedAggregator;
}

#[cfg(feature = "statistics")]
pub use statistics::MomentAccumulator;

#[cfg(feature = "quantiles")]
pub use quantiles::{DigestEstimator, MarkerEstimator};
