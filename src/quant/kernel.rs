//! Sparse kernel selection for converted layers
//!
//! Block-sparse weights can be dispatched to specialized kernels when the
//! block shape used for pruning matches one the backend implements. The
//! mapping from block shape to kernel is an explicit table passed to
//! `convert`, and layers whose shape has no entry fall back to the dense
//! kernel.

use serde::{Deserialize, Serialize};

/// Compute kernel a converted layer is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseKernel {
    /// Plain dense matmul, always valid.
    Dense,
    /// Kernel for blocks spanning a single row, shape `(1, n)`.
    BlockRow,
    /// Kernel for blocks spanning a single column, shape `(n, 1)`.
    BlockCol,
    /// Kernel for square tiles.
    BlockTile,
}

impl SparseKernel {
    pub fn display_name(&self) -> &'static str {
        match self {
            SparseKernel::Dense => "dense",
            SparseKernel::BlockRow => "block_row",
            SparseKernel::BlockCol => "block_col",
            SparseKernel::BlockTile => "block_tile",
        }
    }
}

/// Block shape to kernel mapping consulted during conversion.
///
/// # Example
///
/// ```
/// use podar::quant::{KernelTable, SparseKernel};
///
/// let mut table = KernelTable::new();
/// table.register((1, 4), SparseKernel::BlockRow);
///
/// assert_eq!(table.resolve(Some((1, 4))), SparseKernel::BlockRow);
/// // Unknown shapes and unsparsified layers stay dense
/// assert_eq!(table.resolve(Some((2, 2))), SparseKernel::Dense);
/// assert_eq!(table.resolve(None), SparseKernel::Dense);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelTable {
    entries: Vec<((usize, usize), SparseKernel)>,
}

impl KernelTable {
    /// Empty table; every layer resolves to [`SparseKernel::Dense`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the common block shapes mapped:
    /// `(1, 4)` to `BlockRow`, `(4, 1)` to `BlockCol`, `(4, 4)` to
    /// `BlockTile`.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register((1, 4), SparseKernel::BlockRow);
        table.register((4, 1), SparseKernel::BlockCol);
        table.register((4, 4), SparseKernel::BlockTile);
        table
    }

    /// Map a block shape to a kernel, replacing any earlier entry for the
    /// same shape.
    pub fn register(&mut self, block_shape: (usize, usize), kernel: SparseKernel) {
        if let Some(entry) = self.entries.iter_mut().find(|(shape, _)| *shape == block_shape) {
            entry.1 = kernel;
        } else {
            self.entries.push((block_shape, kernel));
        }
    }

    /// Kernel for a layer pruned with the given block shape. `None` means
    /// the layer was never sparsified.
    pub fn resolve(&self, block_shape: Option<(usize, usize)>) -> SparseKernel {
        block_shape
            .and_then(|shape| {
                self.entries
                    .iter()
                    .find(|(registered, _)| *registered == shape)
                    .map(|(_, kernel)| *kernel)
            })
            .unwrap_or(SparseKernel::Dense)
    }

    pub fn entries(&self) -> &[((usize, usize), SparseKernel)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
