//! Engine configuration
//!
//! [`EngineConfig`] collects the parameters of every summary in one place,
//! with defaults suitable for a few million observations. [`validate`]
//! checks every section without panicking; the builder methods validate
//! their section first and then construct the summary, so a loaded
//! configuration never reaches a panicking constructor.
//!
//! With the `serde` feature every section deserializes with missing fields
//! taken from `Default`.
//!
//! [`validate`]: EngineConfig::validate
//!
//! # Example
//!
//! ```
//! use streamstats::config::EngineConfig;
//!
//! let config = EngineConfig::default().with_seed(7).with_shards(4);
//! config.validate().unwrap();
//!
//! let mut digest = config.digest_estimator().unwrap();
//! digest.update(1.0);
//! ```

use crate::hash::DEFAULT_SEED;
use thiserror::Error;

#[cfg(feature = "frequency")]
use crate::frequency::{dimensions_for_error, FrequencySketch, HeavyHitterTracker, UpdatePolicy};
#[cfg(feature = "membership")]
use crate::membership::{optimal_dimensions, MembershipFilter};
#[cfg(feature = "parallel")]
use crate::parallel::ShardedAggregator;
#[cfg(feature = "quantiles")]
use crate::quantiles::{DigestEstimator, MarkerEstimator};
#[cfg(feature = "robust")]
use crate::robust::RobustSpread;
#[cfg(feature = "statistics")]
use crate::statistics::MomentAccumulator;
#[cfg(feature = "parallel")]
use crate::traits::Sketch;
#[cfg(feature = "frequency")]
use core::hash::Hash;

/// A configuration value out of range
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

fn check_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be positive"));
    }
    Ok(())
}

fn check_open_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ConfigError::invalid(field, format!("must be in (0, 1), got {}", value)));
    }
    Ok(())
}

/// t-digest parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DigestConfig {
    /// Compression δ; roughly the centroid count after compression
    pub compression: f64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { compression: 100.0 }
    }
}

impl DigestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.compression.is_finite() && self.compression >= 1.0) {
            return Err(ConfigError::invalid(
                "digest.compression",
                format!("must be finite and at least 1, got {}", self.compression),
            ));
        }
        Ok(())
    }
}

/// P² parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MarkerConfig {
    /// Target quantile, strictly inside (0, 1)
    pub quantile: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self { quantile: 0.5 }
    }
}

impl MarkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_open_unit("marker.quantile", self.quantile)
    }
}

/// Robust spread parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RobustConfig {
    /// Number of recent values kept for the MAD approximation
    pub mad_window: usize,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self { mad_window: 1024 }
    }
}

impl RobustConfig {
    /// Smallest usable MAD window; P² deviation markers need five samples
    pub const MIN_MAD_WINDOW: usize = 5;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mad_window < Self::MIN_MAD_WINDOW {
            return Err(ConfigError::invalid(
                "robust.mad_window",
                format!(
                    "must be at least {}, got {}",
                    Self::MIN_MAD_WINDOW,
                    self.mad_window
                ),
            ));
        }
        Ok(())
    }
}

/// Bloom filter sizing
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MembershipConfig {
    /// Distinct keys the filter is sized for
    pub expected_items: usize,
    /// Target false-positive rate at `expected_items`
    pub false_positive_rate: f64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            expected_items: 100_000,
            false_positive_rate: 0.01,
        }
    }
}

impl MembershipConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("membership.expected_items", self.expected_items)?;
        check_open_unit("membership.false_positive_rate", self.false_positive_rate)
    }
}

/// Count-Min sizing
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrequencyConfig {
    /// Additive error as a fraction of the stream total
    pub epsilon: f64,
    /// Probability of exceeding `epsilon`
    pub delta: f64,
    /// Use the conservative-update policy
    pub conservative: bool,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            delta: 0.01,
            conservative: false,
        }
    }
}

impl FrequencyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_open_unit("frequency.epsilon", self.epsilon)?;
        check_open_unit("frequency.delta", self.delta)
    }
}

/// Top-K parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HeavyHitterConfig {
    pub k: usize,
    /// Count-Min width of the backing sketch
    pub width: usize,
    /// Count-Min depth of the backing sketch
    pub depth: usize,
}

impl Default for HeavyHitterConfig {
    fn default() -> Self {
        Self {
            k: 10,
            width: 8192,
            depth: 5,
        }
    }
}

impl HeavyHitterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("heavy_hitters.k", self.k)?;
        check_positive("heavy_hitters.width", self.width)?;
        check_positive("heavy_hitters.depth", self.depth)
    }
}

/// Parameters for every summary, plus the hash seed and shard count
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Master seed for every hash family built from this config
    pub seed: u64,
    /// Worker count for sharded ingestion
    pub shards: usize,
    pub digest: DigestConfig,
    pub marker: MarkerConfig,
    pub robust: RobustConfig,
    pub membership: MembershipConfig,
    pub frequency: FrequencyConfig,
    pub heavy_hitters: HeavyHitterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            shards: 4,
            digest: DigestConfig::default(),
            marker: MarkerConfig::default(),
            robust: RobustConfig::default(),
            membership: MembershipConfig::default(),
            frequency: FrequencyConfig::default(),
            heavy_hitters: HeavyHitterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_compression(mut self, compression: f64) -> Self {
        self.digest.compression = compression;
        self
    }

    /// Check every section; the first violation wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("shards", self.shards)?;
        self.digest.validate()?;
        self.marker.validate()?;
        self.robust.validate()?;
        self.membership.validate()?;
        self.frequency.validate()?;
        self.heavy_hitters.validate()
    }

    #[cfg(feature = "statistics")]
    pub fn moment_accumulator(&self) -> MomentAccumulator {
        MomentAccumulator::new()
    }

    #[cfg(feature = "quantiles")]
    pub fn digest_estimator(&self) -> Result<DigestEstimator, ConfigError> {
        self.digest.validate()?;
        Ok(DigestEstimator::new(self.digest.compression))
    }

    #[cfg(feature = "quantiles")]
    pub fn marker_estimator(&self) -> Result<MarkerEstimator, ConfigError> {
        MarkerEstimator::new(self.marker.quantile)
            .map_err(|e| ConfigError::invalid("marker.quantile", e.to_string()))
    }

    /// Robust spread over P² quartiles
    #[cfg(feature = "robust")]
    pub fn robust_with_markers(&self) -> Result<RobustSpread<MarkerEstimator>, ConfigError> {
        self.robust.validate()?;
        Ok(RobustSpread::with_markers(self.robust.mad_window))
    }

    /// Robust spread over t-digest quartiles, using the digest section
    #[cfg(feature = "robust")]
    pub fn robust_with_digests(&self) -> Result<RobustSpread<DigestEstimator>, ConfigError> {
        self.robust.validate()?;
        self.digest.validate()?;
        Ok(RobustSpread::with_digests(
            self.digest.compression,
            self.robust.mad_window,
        ))
    }

    #[cfg(feature = "membership")]
    pub fn membership_filter(&self) -> Result<MembershipFilter, ConfigError> {
        self.membership.validate()?;
        let (bits, hashes) = optimal_dimensions(
            self.membership.expected_items,
            self.membership.false_positive_rate,
        );
        Ok(MembershipFilter::with_seed(bits, hashes, self.seed))
    }

    #[cfg(feature = "frequency")]
    pub fn frequency_sketch(&self) -> Result<FrequencySketch, ConfigError> {
        self.frequency.validate()?;
        let (width, depth) = dimensions_for_error(self.frequency.epsilon, self.frequency.delta);
        let policy = if self.frequency.conservative {
            UpdatePolicy::Conservative
        } else {
            UpdatePolicy::Standard
        };
        Ok(FrequencySketch::with_seed(width, depth, self.seed).with_policy(policy))
    }

    #[cfg(feature = "frequency")]
    pub fn heavy_hitter_tracker<K: Hash + Eq + Clone>(
        &self,
    ) -> Result<HeavyHitterTracker<K>, ConfigError> {
        self.heavy_hitters.validate()?;
        let sketch = FrequencySketch::with_seed(
            self.heavy_hitters.width,
            self.heavy_hitters.depth,
            self.seed,
        );
        Ok(HeavyHitterTracker::with_sketch(self.heavy_hitters.k, sketch))
    }

    /// `shards` copies of `prototype` behind a [`ShardedAggregator`]
    #[cfg(feature = "parallel")]
    pub fn sharded<S: Sketch + Send>(&self, prototype: &S) -> Result<ShardedAggregator<S>, ConfigError> {
        check_positive("shards", self.shards)?;
        Ok(ShardedAggregator::new(prototype, self.shards))
    }
}
