//! Sharded parallel ingestion
//!
//! Summaries are single-threaded. Parallelism comes from owning one summary
//! per worker and merging them afterwards, which every [`Sketch`]
//! supports.
//!
//! [`Sketch`]: crate::traits::Sketch

mod sharded;

pub use sharded::ShardedAggregator;
