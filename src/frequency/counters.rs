//! Saturating counter storage for Count-Min

/// A `depth × width` matrix of `u64` counters stored row-major
///
/// Counters never wrap: additions clamp at `u64::MAX` and latch the
/// [`is_saturated`](Self::is_saturated) flag.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterMatrix {
    cells: Vec<u64>,
    width: usize,
    depth: usize,
    saturated: bool,
}

impl CounterMatrix {
    /// Create a zeroed matrix
    ///
    /// # Panics
    ///
    /// Panics if `width` or `depth` is 0.
    pub fn new(width: usize, depth: usize) -> Self {
        assert!(width > 0, "width must be positive");
        assert!(depth > 0, "depth must be positive");

        Self {
            cells: vec![0u64; width * depth],
            width,
            depth,
            saturated: false,
        }
    }

    /// Counters per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Read one counter
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.cells[row * self.width + col]
    }

    /// Saturating add; returns `true` if this call clamped the counter
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, delta: u64) -> bool {
        let cell = &mut self.cells[row * self.width + col];
        match cell.checked_add(delta) {
            Some(v) => {
                *cell = v;
                false
            }
            None => {
                *cell = u64::MAX;
                self.saturated = true;
                true
            }
        }
    }

    /// Raise a counter to at least `value`
    #[inline]
    pub fn raise_to(&mut self, row: usize, col: usize, value: u64) {
        let cell = &mut self.cells[row * self.width + col];
        if *cell < value {
            *cell = value;
        }
    }

    /// Latch the saturation flag after a clamp done outside [`add`](Self::add)
    pub(crate) fn mark_saturated(&mut self) {
        self.saturated = true;
    }

    /// One row of counters
    pub fn row(&self, row: usize) -> &[u64] {
        let start = row * self.width;
        &self.cells[start..start + self.width]
    }

    /// Whether any counter has ever clamped at `u64::MAX`
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Cell-wise saturating sum of a same-shaped matrix
    ///
    /// Returns `true` if any cell clamped during this call.
    pub(crate) fn add_matrix(&mut self, other: &Self) -> bool {
        debug_assert_eq!((self.width, self.depth), (other.width, other.depth));
        let mut clamped = false;
        for (a, &b) in self.cells.iter_mut().zip(&other.cells) {
            match a.checked_add(b) {
                Some(v) => *a = v,
                None => {
                    *a = u64::MAX;
                    clamped = true;
                }
            }
        }
        self.saturated |= clamped || other.saturated;
        clamped
    }

    /// Zero every counter and reset the saturation flag
    pub(crate) fn clear(&mut self) {
        self.cells.fill(0);
        self.saturated = false;
    }

    /// Heap bytes used by the counters
    pub(crate) fn size_bytes(&self) -> usize {
        self.cells.len() * core::mem::size_of::<u64>()
    }
}
