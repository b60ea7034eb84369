//! Block-structured mask policy ranked by weight norm
//!
//! Blocks of the configured shape are scored by the mean Lp norm of their
//! entries. The lowest-scoring fraction of blocks is selected, and inside
//! each selected block the smallest-magnitude entries are zeroed, up to the
//! group's zeros-per-block count. With zeros-per-block equal to the block
//! element count, selected blocks are zeroed entirely and the achieved zero
//! fraction equals the sparsity level (up to block rounding).

use crate::sparsity::{MaskUpdate, SparsityGroup, SparsityMask};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Norm used to score blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    /// Mean absolute value per block.
    L1,
    /// Mean squared value per block.
    #[default]
    L2,
}

/// Block-norm mask policy.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use podar::sparsity::{MaskUpdate, SparsityGroup, WeightNorm};
///
/// let group = SparsityGroup::new("w").with_block_shape(1, 4).with_zeros_per_block(4);
/// let weight = array![
///     [0.1, 0.2, 0.1, 0.2],
///     [5.0, 6.0, 7.0, 8.0],
/// ];
/// let mask = WeightNorm::default().update_mask(weight.view(), 0.5, &group);
/// // The low-norm row is zeroed, the high-norm row survives
/// assert!(!mask.is_kept(0, 0));
/// assert!(mask.is_kept(1, 0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightNorm {
    #[serde(default)]
    pub norm: Norm,
}

impl WeightNorm {
    pub fn new(norm: Norm) -> Self {
        Self { norm }
    }

    fn score(&self, magnitude: f32) -> f32 {
        match self.norm {
            Norm::L1 => magnitude,
            Norm::L2 => magnitude * magnitude,
        }
    }
}

fn block_bounds(
    block_row: usize,
    block_col: usize,
    shape: (usize, usize),
    rows: usize,
    cols: usize,
) -> (usize, usize, usize, usize) {
    let r0 = block_row * shape.0;
    let c0 = block_col * shape.1;
    (r0, (r0 + shape.0).min(rows), c0, (c0 + shape.1).min(cols))
}

impl MaskUpdate for WeightNorm {
    fn update_mask(
        &self,
        weight: ArrayView2<'_, f32>,
        level: f32,
        group: &SparsityGroup,
    ) -> SparsityMask {
        let (rows, cols) = weight.dim();
        if rows == 0 || cols == 0 || level <= 0.0 {
            return SparsityMask::ones(rows, cols);
        }

        // Shape is validated at prepare time; guard anyway for direct calls
        let shape = (group.settings.block_shape.0.max(1), group.settings.block_shape.1.max(1));
        let zeros_per_block = group.settings.zeros_per_block.min(shape.0 * shape.1);
        if zeros_per_block == 0 {
            return SparsityMask::ones(rows, cols);
        }

        let grid_rows = rows.div_ceil(shape.0);
        let grid_cols = cols.div_ceil(shape.1);
        let num_blocks = grid_rows * grid_cols;

        // Mean norm per block over its valid region; edge blocks may be
        // smaller than the nominal shape.
        let mut scores: Vec<(f32, usize)> = Vec::with_capacity(num_blocks);
        for block_row in 0..grid_rows {
            for block_col in 0..grid_cols {
                let (r0, r1, c0, c1) = block_bounds(block_row, block_col, shape, rows, cols);
                let mut acc = 0.0f32;
                let mut count = 0usize;
                for r in r0..r1 {
                    for c in c0..c1 {
                        acc += self.score(weight[[r, c]].abs());
                        count += 1;
                    }
                }
                scores.push((acc / count as f32, block_row * grid_cols + block_col));
            }
        }

        let selected = ((num_blocks as f32) * level.min(1.0)).round() as usize;
        let selected = selected.min(num_blocks);
        if selected == 0 {
            return SparsityMask::ones(rows, cols);
        }
        scores.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut mask = SparsityMask::ones(rows, cols);
        for &(_, block) in scores.iter().take(selected) {
            let (r0, r1, c0, c1) =
                block_bounds(block / grid_cols, block % grid_cols, shape, rows, cols);
            let mut entries: Vec<(f32, usize, usize)> = Vec::new();
            for r in r0..r1 {
                for c in c0..c1 {
                    entries.push((weight[[r, c]].abs(), r, c));
                }
            }
            entries.sort_by(|a, b| a.0.total_cmp(&b.0).then((a.1, a.2).cmp(&(b.1, b.2))));
            for &(_, r, c) in entries.iter().take(zeros_per_block) {
                mask.set(r, c, false);
            }
        }
        mask
    }

    fn name(&self) -> &'static str {
        "weight_norm"
    }
}

// =============================================================================
// Tests
// =============================================================================
