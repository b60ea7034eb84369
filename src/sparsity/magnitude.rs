//! Unstructured mask policy ranked by individual weight magnitude

use crate::sparsity::{MaskUpdate, SparsityGroup, SparsityMask};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Global magnitude mask policy.
///
/// Ignores the group's block shape and zeros the smallest-magnitude
/// fraction of individual weights. Useful as a baseline against the
/// block-structured policy, and as the simplest template for custom
/// [`MaskUpdate`] implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Magnitude;

impl MaskUpdate for Magnitude {
    fn update_mask(
        &self,
        weight: ArrayView2<'_, f32>,
        level: f32,
        _group: &SparsityGroup,
    ) -> SparsityMask {
        let (rows, cols) = weight.dim();
        let total = rows * cols;
        if total == 0 || level <= 0.0 {
            return SparsityMask::ones(rows, cols);
        }

        let zeros = ((total as f32) * level.min(1.0)).round() as usize;
        let zeros = zeros.min(total);
        if zeros == 0 {
            return SparsityMask::ones(rows, cols);
        }

        let mut entries: Vec<(f32, usize, usize)> = Vec::with_capacity(total);
        for r in 0..rows {
            for c in 0..cols {
                entries.push((weight[[r, c]].abs(), r, c));
            }
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0).then((a.1, a.2).cmp(&(b.1, b.2))));

        let mut mask = SparsityMask::ones(rows, cols);
        for &(_, r, c) in entries.iter().take(zeros) {
            mask.set(r, c, false);
        }
        mask
    }

    fn name(&self) -> &'static str {
        "magnitude"
    }
}

// =============================================================================
// Tests
// =============================================================================
