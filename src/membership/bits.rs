//! Fixed-size bit array backing the membership filter

/// `m` bits packed into 64-bit words
///
/// Only `set` is exposed on the write side: a bit, once set, stays set until
/// the whole array is cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitArray {
    words: Vec<u64>,
    len: usize,
}

impl BitArray {
    /// Create an array of `len` zero bits
    ///
    /// # Panics
    ///
    /// Panics if `len` is 0.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "bit array length must be positive");
        Self {
            words: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    /// Number of addressable bits
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; the array has at least one bit
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bit `idx`
    #[inline]
    pub fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.len);
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Read bit `idx`
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Bitwise OR of another array of the same length into this one
    pub(crate) fn union_with(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    /// Reset every bit
    pub(crate) fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Heap bytes used by the words
    pub(crate) fn size_bytes(&self) -> usize {
        self.words.len() * core::mem::size_of::<u64>()
    }
}
