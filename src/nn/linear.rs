//! Fully-connected layer with an optional attached sparsity mask

use crate::sparsity::{SparsityError, SparsityMask};
use ndarray::{Array1, Array2};
use rand::Rng;

/// Fully-connected layer computing `y = W x + b`.
///
/// Weight shape is `(out_features, in_features)`. A layer may carry an
/// attached [`SparsityMask`]; while attached, the mask is applied
/// multiplicatively on every forward pass, and squashing folds it into the
/// weight permanently.
///
/// # Example
///
/// ```
/// use podar::nn::Linear;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let layer = Linear::init(16, 16, &mut rng);
/// assert_eq!(layer.out_features(), 16);
/// assert_eq!(layer.num_parameters(), 16 * 16 + 16);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
    mask: Option<SparsityMask>,
    sparse_block_shape: Option<(usize, usize)>,
}

impl Linear {
    /// Create a layer from explicit weight and bias.
    ///
    /// # Panics
    ///
    /// Panics if `bias.len()` differs from the number of weight rows.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Self {
        assert_eq!(
            weight.nrows(),
            bias.len(),
            "bias length must match weight rows"
        );
        Self { weight, bias, mask: None, sparse_block_shape: None }
    }

    /// Random init with uniform bounds `±1/sqrt(in_features)`, zero bias.
    pub fn init(out_features: usize, in_features: usize, rng: &mut impl Rng) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight = Array2::from_shape_fn((out_features, in_features), |_| {
            -bound + rng.random::<f32>() * (2.0 * bound)
        });
        Self::new(weight, Array1::zeros(out_features))
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Raw weight, ignoring any attached mask
    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    pub fn weight_mut(&mut self) -> &mut Array2<f32> {
        &mut self.weight
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    pub fn bias_mut(&mut self) -> &mut Array1<f32> {
        &mut self.bias
    }

    /// Attached mask, if any
    pub fn mask(&self) -> Option<&SparsityMask> {
        self.mask.as_ref()
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Attach a mask, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the mask shape differs from the weight.
    pub fn attach_mask(&mut self, mask: SparsityMask) -> Result<(), SparsityError> {
        let (mr, mc) = mask.dims();
        let (wr, wc) = self.weight.dim();
        if (mr, mc) != (wr, wc) {
            return Err(SparsityError::ShapeMismatch(mr, mc, wr, wc));
        }
        self.mask = Some(mask);
        Ok(())
    }

    /// Remove the attached mask without applying it.
    pub fn detach_mask(&mut self) -> Option<SparsityMask> {
        self.mask.take()
    }

    /// Fold the attached mask into the weight and remove it.
    ///
    /// Afterwards the zeroed entries are stored in the weight itself, so the
    /// forward pass no longer depends on a mask. A layer with no mask is
    /// left unchanged.
    pub fn squash_mask(&mut self) {
        if let Some(mask) = self.mask.take() {
            self.weight = mask.apply(&self.weight);
        }
    }

    /// Block shape recorded by the most recent squash, if any.
    ///
    /// Consulted when mapping the layer onto a sparse compute kernel.
    pub fn sparse_block_shape(&self) -> Option<(usize, usize)> {
        self.sparse_block_shape
    }

    pub fn set_sparse_block_shape(&mut self, shape: (usize, usize)) {
        self.sparse_block_shape = Some(shape);
    }

    /// Weight with the mask applied (a copy of the raw weight when no mask
    /// is attached).
    pub fn effective_weight(&self) -> Array2<f32> {
        match &self.mask {
            Some(mask) => mask.apply(&self.weight),
            None => self.weight.clone(),
        }
    }

    /// Fraction of zero entries in the effective weight
    pub fn sparsity(&self) -> f32 {
        let n = self.weight.len();
        if n == 0 {
            return 0.0;
        }
        self.zero_count() as f32 / n as f32
    }

    /// Number of zero entries in the effective weight
    pub fn zero_count(&self) -> usize {
        match &self.mask {
            Some(mask) => self
                .weight
                .indexed_iter()
                .filter(|&((r, c), &w)| w == 0.0 || !mask.is_kept(r, c))
                .count(),
            None => self.weight.iter().filter(|&&w| w == 0.0).count(),
        }
    }

    /// Forward pass with the effective weight.
    ///
    /// # Panics
    ///
    /// Panics if `input.len()` differs from `in_features`.
    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        match &self.mask {
            Some(mask) => mask.apply(&self.weight).dot(input) + &self.bias,
            None => self.weight.dot(input) + &self.bias,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward() {
        let layer = Linear::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.5, -0.5]);
        let out = layer.forward(&array![1.0, 1.0]);
        assert_abs_diff_eq!(out[0], 3.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 6.5, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_init_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let layer = Linear::init(16, 16, &mut rng);
        let bound = 1.0 / 4.0;
        assert!(layer.weight().iter().all(|w| w.abs() <= bound));
        assert!(layer.bias().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_linear_init_seeded_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(Linear::init(4, 4, &mut a), Linear::init(4, 4, &mut b));
    }

    #[test]
    fn test_masked_forward_matches_squashed_forward() {
        let mut masked = Linear::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.0, 0.0]);
        let mut mask = SparsityMask::ones(2, 2);
        mask.set(0, 1, false);
        mask.set(1, 0, false);
        masked.attach_mask(mask).unwrap();

        let mut squashed = masked.clone();
        squashed.squash_mask();

        let input = array![2.0, -1.0];
        let a = masked.forward(&input);
        let b = squashed.forward(&input);
        assert_abs_diff_eq!(a[0], b[0], epsilon = 1e-6);
        assert_abs_diff_eq!(a[1], b[1], epsilon = 1e-6);
    }

    #[test]
    fn test_attach_mask_shape_mismatch() {
        let mut layer = Linear::new(array![[1.0, 2.0]], array![0.0]);
        let err = layer.attach_mask(SparsityMask::ones(2, 2)).unwrap_err();
        assert!(format!("{err}").contains("does not match"));
        assert!(!layer.has_mask());
    }

    #[test]
    fn test_squash_folds_zeros_into_weight() {
        let mut layer = Linear::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.0, 0.0]);
        let mut mask = SparsityMask::ones(2, 2);
        mask.set(0, 0, false);
        mask.set(1, 1, false);
        layer.attach_mask(mask).unwrap();
        assert_abs_diff_eq!(layer.sparsity(), 0.5, epsilon = 1e-6);

        layer.squash_mask();
        assert!(!layer.has_mask());
        assert_eq!(layer.weight()[[0, 0]], 0.0);
        assert_eq!(layer.weight()[[1, 1]], 0.0);
        // Zero fraction unchanged by the squash
        assert_abs_diff_eq!(layer.sparsity(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_squash_without_mask_is_noop() {
        let mut layer = Linear::new(array![[1.0, 2.0]], array![0.0]);
        layer.squash_mask();
        assert_eq!(layer.weight(), &array![[1.0, 2.0]]);
    }

    #[test]
    fn test_detach_mask_leaves_weight_dense() {
        let mut layer = Linear::new(array![[1.0, 2.0]], array![0.0]);
        let mut mask = SparsityMask::ones(1, 2);
        mask.set(0, 0, false);
        layer.attach_mask(mask).unwrap();

        let detached = layer.detach_mask().unwrap();
        assert_eq!(detached.zero_count(), 1);
        assert_eq!(layer.weight()[[0, 0]], 1.0);
        assert_eq!(layer.sparsity(), 0.0);
    }

    #[test]
    #[should_panic(expected = "bias length")]
    fn test_new_rejects_mismatched_bias() {
        let _ = Linear::new(array![[1.0, 2.0]], array![0.0, 0.0]);
    }
}
