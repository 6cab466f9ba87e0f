//! Seeded hash families
//!
//! A [`HashFamily`] yields `k` independent 64-bit hashes of a key by running
//! xxh3 with `k` distinct seeds. Seeds are derived once, at construction,
//! from a single master seed; there is no process-wide hashing state.
//!
//! These hashes are fast and well distributed but not collision resistant
//! against adversarial input.

use core::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// Master seed used by the `new` constructors of every sketch
pub const DEFAULT_SEED: u64 = 0x5eed_cafe_f00d_d00d;

/// splitmix64 step, used to spread the master seed into per-function seeds
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// A family of `k` seeded hash functions
///
/// # Example
///
/// ```
/// use streamstats::hash::HashFamily;
///
/// let family = HashFamily::new(3, 42);
/// let hashes: Vec<u64> = family.hashes(b"key".as_slice()).collect();
/// assert_eq!(hashes.len(), 3);
///
/// // Same seed, same hashes
/// let again = HashFamily::new(3, 42);
/// assert_eq!(family.hash(0, b"key".as_slice()), again.hash(0, b"key".as_slice()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashFamily {
    seed: u64,
    seeds: Vec<u64>,
}

impl HashFamily {
    /// Create `k` hash functions derived from `seed`
    ///
    /// # Panics
    ///
    /// Panics if `k` is 0.
    pub fn new(k: usize, seed: u64) -> Self {
        assert!(k > 0, "hash family needs at least one function");

        let mut state = seed;
        let seeds = (0..k).map(|_| splitmix64(&mut state)).collect();
        Self { seed, seeds }
    }

    /// Number of hash functions
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Always false; a family has at least one function
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Master seed the family was derived from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Hash `key` with function `i`
    ///
    /// Every key, byte slices included, goes through its [`Hash`] impl with
    /// a seeded streaming xxh3 hasher, so `&[u8]` and `Vec<u8>` keys agree.
    #[inline]
    pub fn hash<K: Hash + ?Sized>(&self, i: usize, key: &K) -> u64 {
        let mut hasher = Xxh3::with_seed(self.seeds[i]);
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// All `k` hashes of `key`, in function order
    pub fn hashes<'a, K: Hash + ?Sized>(&'a self, key: &'a K) -> impl Iterator<Item = u64> + 'a {
        (0..self.seeds.len()).map(move |i| self.hash(i, key))
    }

    /// All `k` hashes of `key` reduced into `[0, modulus)`
    pub fn indices<'a, K: Hash + ?Sized>(
        &'a self,
        key: &'a K,
        modulus: usize,
    ) -> impl Iterator<Item = usize> + 'a {
        debug_assert!(modulus > 0);
        self.hashes(key).map(move |h| (h % modulus as u64) as usize)
    }
}
