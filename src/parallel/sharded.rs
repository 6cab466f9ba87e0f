//! Sharded aggregation on the rayon pool

use crate::traits::{MergeError, Sketch};
use core::borrow::Borrow;
use rayon::prelude::*;

/// Fan-out/fan-in ingestion over `N` independent shards
///
/// [`ingest`](Self::ingest) splits a batch into at most `N` contiguous
/// chunks and feeds chunk `i` to shard `i` on the rayon pool. Nothing is
/// shared between workers, so there is no locking. After the join,
/// [`finish`](Self::finish) folds the shards left to right with `merge`.
/// The chunk assignment and the fold order depend only on the batch and
/// the shard count, so repeated runs produce identical results.
///
/// # Example
///
/// ```
/// use streamstats::parallel::ShardedAggregator;
/// use streamstats::statistics::MomentAccumulator;
///
/// let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), 4);
/// let values: Vec<f64> = (1..=1000).map(|i| i as f64).collect();
/// agg.ingest(&values);
///
/// let total = agg.finish().unwrap();
/// assert_eq!(total.len(), 1000);
/// assert!((total.mean() - 500.5).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct ShardedAggregator<S> {
    shards: Vec<S>,
}

impl<S: Sketch + Send> ShardedAggregator<S> {
    /// `num_shards` clones of `prototype`, which should be empty
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is 0.
    pub fn new(prototype: &S, num_shards: usize) -> Self {
        assert!(num_shards > 0, "num_shards must be positive");
        Self {
            shards: vec![prototype.clone(); num_shards],
        }
    }

    /// Use pre-built shards
    ///
    /// # Panics
    ///
    /// Panics if `shards` is empty.
    pub fn from_shards(shards: Vec<S>) -> Self {
        assert!(!shards.is_empty(), "num_shards must be positive");
        Self { shards }
    }

    /// Number of shards
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Read-only view of the shards
    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    /// Direct access to one shard, for callers that route items themselves
    pub fn shard_mut(&mut self, index: usize) -> &mut S {
        &mut self.shards[index]
    }

    /// Items processed across all shards
    pub fn count(&self) -> u64 {
        self.shards.iter().map(Sketch::count).sum()
    }

    /// Feed a batch, one contiguous chunk per shard, in parallel
    ///
    /// Within a chunk, items are applied in order. Batches shorter than the
    /// shard count leave the trailing shards untouched.
    pub fn ingest<T>(&mut self, batch: &[T])
    where
        T: Borrow<S::Item> + Sync,
    {
        if batch.is_empty() {
            return;
        }
        let chunk_size = batch.len().div_ceil(self.shards.len());

        self.shards
            .par_iter_mut()
            .zip(batch.par_chunks(chunk_size))
            .enumerate()
            .for_each(|(index, (shard, chunk))| {
                tracing::trace!(shard = index, items = chunk.len(), "ingesting shard batch");
                for item in chunk {
                    let item: &S::Item = item.borrow();
                    shard.update(item);
                }
            });
    }

    /// Merge a copy of every shard, left to right, without consuming them
    pub fn snapshot(&self) -> Result<S, MergeError> {
        let mut acc = self.shards[0].clone();
        for shard in &self.shards[1..] {
            acc.merge(shard)?;
        }
        Ok(acc)
    }

    /// Fold all shards left to right into one summary
    ///
    /// Fails if the shards were built with incompatible parameters.
    pub fn finish(self) -> Result<S, MergeError> {
        let num_shards = self.shards.len();
        let mut shards = self.shards;
        let mut acc = shards.remove(0);
        for shard in &shards {
            acc.merge(shard)?;
        }

        tracing::debug!(shards = num_shards, count = acc.count(), "folded shards");
        Ok(acc)
    }
}

#[cfg(all(test, feature = "statistics"))]
mod tests {
    use super::*;
    use crate::statistics::MomentAccumulator;

    #[test]
    fn test_matches_sequential() {
        let values: Vec<f64> = (0..10_000).map(|i| ((i * 37) % 1001) as f64 * 0.5).collect();

        let mut sequential = MomentAccumulator::new();
        sequential.extend(values.iter().copied());

        for shards in [1, 2, 3, 7, 16] {
            let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), shards);
            agg.ingest(&values);
            assert_eq!(agg.count(), 10_000);
            let merged = agg.finish().unwrap();

            assert_eq!(merged.len(), sequential.len());
            assert!((merged.mean() - sequential.mean()).abs() < 1e-9);
            assert!((merged.variance() - sequential.variance()).abs() / sequential.variance() < 1e-9);
        }
    }

    #[test]
    fn test_contiguous_chunks() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), 3);
        agg.ingest(&values);

        // chunk size 4: [0..4), [4..8), [8..10)
        let counts: Vec<u64> = agg.shards().iter().map(|s| s.len()).collect();
        assert_eq!(counts, vec![4, 4, 2]);
        assert_eq!(agg.shards()[1].min(), Some(4.0));
        assert_eq!(agg.shards()[1].max(), Some(7.0));
    }

    #[test]
    fn test_short_batch() {
        let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), 8);
        agg.ingest(&[1.0, 2.0]);
        agg.ingest::<f64>(&[]);
        assert_eq!(agg.count(), 2);
        assert_eq!(agg.shards()[7].len(), 0);
    }

    #[test]
    fn test_deterministic() {
        let values: Vec<f64> = (0..5000).map(|i| (i as f64).sin() * 100.0).collect();
        let run = || {
            let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), 6);
            agg.ingest(&values);
            agg.finish().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_snapshot_leaves_shards() {
        let mut agg = ShardedAggregator::new(&MomentAccumulator::new(), 2);
        agg.ingest(&[1.0, 2.0, 3.0, 4.0]);
        let snap = agg.snapshot().unwrap();
        assert_eq!(snap.len(), 4);
        agg.shard_mut(0).update(10.0);
        assert_eq!(agg.finish().unwrap().len(), 5);
    }

    #[test]
    #[should_panic(expected = "num_shards must be positive")]
    fn test_zero_shards_panics() {
        ShardedAggregator::new(&MomentAccumulator::new(), 0);
    }
}
