//! Top-K heavy hitters over a Count-Min sketch
//!
//! Every update feeds the [`FrequencySketch`] and then re-reads the key's
//! estimate. A bounded min-heap keeps the K keys with the largest
//! estimates; a key → slot map makes refreshing a resident key O(log K).

use crate::frequency::count_min::FrequencySketch;
use crate::traits::{MergeError, Sketch};
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct Entry<K> {
    key: K,
    estimate: u64,
}

/// Approximate top-K tracker
///
/// Only keys whose estimate beat the heap minimum at the moment they were
/// seen are candidates. On skewed (e.g. Zipfian) streams the true heavy
/// hitters dominate early and stay resident. On flat streams the reported
/// set is close to arbitrary: the estimates of the tail are mostly
/// collision noise.
///
/// # Example
///
/// ```
/// use streamstats::frequency::HeavyHitterTracker;
///
/// let mut tracker = HeavyHitterTracker::<String>::new(2, 1024, 4);
///
/// for _ in 0..100 { tracker.update("apple"); }
/// for _ in 0..50 { tracker.update("banana"); }
/// for _ in 0..5 { tracker.update("cherry"); }
///
/// let top = tracker.top_k();
/// assert_eq!(top[0].0, "apple");
/// assert_eq!(top[1].0, "banana");
/// ```
#[derive(Clone, Debug)]
pub struct HeavyHitterTracker<K> {
    k: usize,
    sketch: FrequencySketch,
    /// Min-heap on `estimate`
    heap: Vec<Entry<K>>,
    slots: HashMap<K, usize>,
}

impl<K: Hash + Eq + Clone> HeavyHitterTracker<K> {
    /// Track the top `k` keys over a `width × depth` Count-Min sketch
    ///
    /// # Panics
    ///
    /// Panics if `k`, `width` or `depth` is 0.
    pub fn new(k: usize, width: usize, depth: usize) -> Self {
        Self::with_sketch(k, FrequencySketch::new(width, depth))
    }

    /// Track the top `k` keys over an existing (usually empty) sketch
    ///
    /// # Panics
    ///
    /// Panics if `k` is 0.
    pub fn with_sketch(k: usize, sketch: FrequencySketch) -> Self {
        assert!(k > 0, "k must be positive");

        Self {
            k,
            sketch,
            heap: Vec::with_capacity(k),
            slots: HashMap::with_capacity(k),
        }
    }

    /// Maximum number of keys reported
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of keys currently resident
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// The underlying frequency sketch
    pub fn sketch(&self) -> &FrequencySketch {
        &self.sketch
    }

    /// Record one occurrence of `key`
    pub fn update<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.update_by(key, 1);
    }

    /// Record `delta` occurrences of `key`
    pub fn update_by<Q>(&mut self, key: &Q, delta: u64)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.sketch.update(key, delta);
        let estimate = self.sketch.estimate(key);

        if let Some(&slot) = self.slots.get(key) {
            // Estimates only grow, so a refreshed entry can only sink
            self.heap[slot].estimate = estimate;
            self.sift_down(slot);
        } else if self.heap.len() < self.k {
            self.push(key.to_owned(), estimate);
        } else if estimate > self.heap[0].estimate {
            self.replace_min(key.to_owned(), estimate);
        }
    }

    /// Whether `key` is currently in the top-K set
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.contains_key(key)
    }

    /// Count-Min estimate for any key, resident or not
    pub fn estimate<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.sketch.estimate(key)
    }

    /// Resident keys with their estimates, largest first
    pub fn top_k(&self) -> Vec<(K, u64)> {
        let mut items: Vec<(K, u64)> = self
            .heap
            .iter()
            .map(|e| (e.key.clone(), e.estimate))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items
    }

    fn push(&mut self, key: K, estimate: u64) {
        let slot = self.heap.len();
        self.slots.insert(key.clone(), slot);
        self.heap.push(Entry { key, estimate });
        self.sift_up(slot);
    }

    fn replace_min(&mut self, key: K, estimate: u64) {
        let evicted = core::mem::replace(&mut self.heap[0], Entry { key: key.clone(), estimate });
        self.slots.remove(&evicted.key);
        self.slots.insert(key, 0);
        self.sift_down(0);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].estimate >= self.heap[parent].estimate {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.heap[left].estimate < self.heap[smallest].estimate {
                smallest = left;
            }
            if right < len && self.heap[right].estimate < self.heap[smallest].estimate {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        if let Some(slot) = self.slots.get_mut(&self.heap[a].key) {
            *slot = a;
        }
        if let Some(slot) = self.slots.get_mut(&self.heap[b].key) {
            *slot = b;
        }
    }

    /// Rebuild the heap from scratch out of `candidates`, ranked by the
    /// current sketch
    fn rerank(&mut self, candidates: Vec<K>) {
        let mut ranked: Vec<Entry<K>> = candidates
            .into_iter()
            .map(|key| {
                let estimate = self.sketch.estimate(&key);
                Entry { key, estimate }
            })
            .collect();
        ranked.sort_by(|a, b| b.estimate.cmp(&a.estimate));
        ranked.truncate(self.k);

        self.heap.clear();
        self.slots.clear();
        for entry in ranked {
            self.push(entry.key, entry.estimate);
        }
    }
}

impl<K: Hash + Eq + Clone + Debug> Sketch for HeavyHitterTracker<K> {
    type Item = K;

    fn update(&mut self, item: &K) {
        self.update_by(item, 1);
    }

    /// Merge the sketches, then re-rank the union of both candidate sets
    ///
    /// Keys that were resident on neither side are lost even if their
    /// combined frequency would qualify.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.k != other.k {
            return Err(MergeError::IncompatibleConfig {
                expected: format!("k={}", self.k),
                found: format!("k={}", other.k),
            });
        }
        self.sketch.merge(&other.sketch)?;

        let mut candidates: Vec<K> = self.heap.drain(..).map(|e| e.key).collect();
        for entry in &other.heap {
            if !self.slots.contains_key(&entry.key) {
                candidates.push(entry.key.clone());
            }
        }
        self.rerank(candidates);
        Ok(())
    }

    fn clear(&mut self) {
        self.sketch.clear();
        self.heap.clear();
        self.slots.clear();
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.sketch.size_bytes()
            + self.heap.capacity() * core::mem::size_of::<Entry<K>>()
            + self.slots.capacity() * (core::mem::size_of::<K>() + core::mem::size_of::<usize>())
    }

    fn count(&self) -> u64 {
        self.sketch.count()
    }
}

#[cfg(feature = "serde")]
impl<K: serde::Serialize> serde::Serialize for HeavyHitterTracker<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let entries: Vec<_> = self.heap.iter().map(|e| (&e.key, e.estimate)).collect();

        let mut state = serializer.serialize_struct("HeavyHitterTracker", 3)?;
        state.serialize_field("k", &self.k)?;
        state.serialize_field("sketch", &self.sketch)?;
        state.serialize_field("entries", &entries)?;
        state.end()
    }
}
