//! Binary sparsity masks
//!
//! A mask is a {0, 1}-valued matrix with the same shape as the weight it
//! covers, applied multiplicatively. Masked entries contribute zero to the
//! forward pass while the underlying weight values stay intact until the
//! mask is squashed into the weight.

use ndarray::Array2;

/// A {0, 1}-valued mask over a 2-D weight matrix.
///
/// # Example
///
/// ```
/// use podar::sparsity::SparsityMask;
///
/// let mut mask = SparsityMask::ones(2, 4);
/// assert_eq!(mask.sparsity(), 0.0);
///
/// mask.set(0, 0, false);
/// mask.set(0, 1, false);
/// assert_eq!(mask.zero_count(), 2);
/// assert_eq!(mask.sparsity(), 0.25);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SparsityMask {
    data: Array2<f32>,
}

impl SparsityMask {
    /// All-ones mask (no sparsity)
    pub fn ones(rows: usize, cols: usize) -> Self {
        Self { data: Array2::ones((rows, cols)) }
    }

    /// Build a mask entry by entry; `keep` returns true for surviving entries
    pub fn from_fn(rows: usize, cols: usize, mut keep: impl FnMut(usize, usize) -> bool) -> Self {
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
            if keep(r, c) {
                1.0
            } else {
                0.0
            }
        });
        Self { data }
    }

    /// Reconstruct a mask from stored values, snapping entries to {0, 1}
    pub fn from_array(values: &Array2<f32>) -> Self {
        let data = values.mapv(|v| if v > 0.5 { 1.0 } else { 0.0 });
        Self { data }
    }

    /// Mask dimensions as (rows, cols)
    pub fn dims(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Number of zeroed entries
    pub fn zero_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == 0.0).count()
    }

    /// Fraction of zeroed entries, in [0, 1]
    pub fn sparsity(&self) -> f32 {
        let n = self.data.len();
        if n == 0 {
            return 0.0;
        }
        self.zero_count() as f32 / n as f32
    }

    /// True when no entry is masked out
    pub fn is_all_ones(&self) -> bool {
        self.data.iter().all(|&v| v == 1.0)
    }

    /// True when the entry at (row, col) survives masking
    pub fn is_kept(&self, row: usize, col: usize) -> bool {
        self.data[[row, col]] == 1.0
    }

    /// Keep (true) or zero out (false) the entry at (row, col)
    pub fn set(&mut self, row: usize, col: usize, keep: bool) {
        self.data[[row, col]] = if keep { 1.0 } else { 0.0 };
    }

    /// Elementwise product of the mask with a weight matrix
    pub fn apply(&self, weight: &Array2<f32>) -> Array2<f32> {
        weight * &self.data
    }

    /// Raw {0, 1} values
    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }
}
