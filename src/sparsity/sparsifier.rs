//! Mask engine with a pluggable update policy
//!
//! The engine owns the configuration groups and drives the mask lifecycle:
//! `prepare` attaches all-ones masks, `step` recomputes them through the
//! policy's `update_mask`, and `squash_masks` folds them into the weights.
//! Policies implement [`MaskUpdate`] and see one weight matrix at a time.

use crate::nn::Sequential;
use crate::sparsity::{SparsityConfig, SparsityError, SparsityGroup, SparsityMask};
use ndarray::ArrayView2;

/// Pluggable mask-update policy.
///
/// Implement this to customize how masks are recomputed on each step. The
/// engine passes the raw (unmasked) weight, the effective sparsity level for
/// this step, and the layer's resolved configuration group.
///
/// # Example
///
/// ```
/// use ndarray::ArrayView2;
/// use podar::sparsity::{MaskUpdate, SparsityGroup, SparsityMask};
///
/// /// Zeroes every entry below a fixed threshold, ignoring the level.
/// struct Threshold(f32);
///
/// impl MaskUpdate for Threshold {
///     fn update_mask(
///         &self,
///         weight: ArrayView2<'_, f32>,
///         _level: f32,
///         _group: &SparsityGroup,
///     ) -> SparsityMask {
///         let (rows, cols) = weight.dim();
///         SparsityMask::from_fn(rows, cols, |r, c| weight[[r, c]].abs() >= self.0)
///     }
///
///     fn name(&self) -> &'static str {
///         "threshold"
///     }
/// }
/// ```
pub trait MaskUpdate {
    /// Compute a fresh mask for `weight` at the given effective level.
    fn update_mask(
        &self,
        weight: ArrayView2<'_, f32>,
        level: f32,
        group: &SparsityGroup,
    ) -> SparsityMask;

    /// Policy name used in reports and saved metadata.
    fn name(&self) -> &'static str;
}

/// Resolved per-layer state tracked between prepare and squash
#[derive(Debug, Clone)]
pub struct GroupState {
    group: SparsityGroup,
    scale: f32,
}

impl GroupState {
    pub fn layer(&self) -> &str {
        &self.group.layer
    }

    pub fn group(&self) -> &SparsityGroup {
        &self.group
    }

    /// Scheduler-controlled scaling factor in [0, 1]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Level actually applied on the next step: base level times scale
    pub fn effective_level(&self) -> f32 {
        (self.group.settings.sparsity_level * self.scale).clamp(0.0, 1.0)
    }
}

/// Mask engine driving the sparsity lifecycle over a model.
///
/// # Example
///
/// ```
/// use podar::nn::{Linear, Sequential};
/// use podar::sparsity::{SparsityConfig, WeightNormSparsifier};
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let mut model = Sequential::new().with_linear("linear", Linear::init(16, 16, &mut rng));
///
/// let mut sparsifier = WeightNormSparsifier::with_defaults();
/// sparsifier.prepare(&mut model)?;
/// // All-ones masks: nothing is sparse until the first step
/// assert_eq!(model.sparsity_report().overall, 0.0);
///
/// sparsifier.step(&mut model)?;
/// sparsifier.squash_masks(&mut model)?;
/// assert!((model.sparsity_report().overall - 0.5).abs() < 1e-6);
/// # Ok::<(), podar::sparsity::SparsityError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Sparsifier<U: MaskUpdate> {
    update: U,
    config: SparsityConfig,
    groups: Vec<GroupState>,
    prepared: bool,
}

/// Block-norm engine, the stock configuration
pub type WeightNormSparsifier = Sparsifier<crate::sparsity::WeightNorm>;

/// Unstructured magnitude engine
pub type MagnitudeSparsifier = Sparsifier<crate::sparsity::Magnitude>;

impl WeightNormSparsifier {
    /// Weight-norm engine with the stock defaults: level 0.5, 1x4 blocks,
    /// four zeros per block.
    pub fn with_defaults() -> Self {
        Sparsifier::new(crate::sparsity::WeightNorm::default(), SparsityConfig::default())
    }
}

impl<U: MaskUpdate> Sparsifier<U> {
    pub fn new(update: U, config: SparsityConfig) -> Self {
        Self { update, config, groups: Vec::new(), prepared: false }
    }

    pub fn policy(&self) -> &U {
        &self.update
    }

    pub fn policy_name(&self) -> &'static str {
        self.update.name()
    }

    pub fn config(&self) -> &SparsityConfig {
        &self.config
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Resolved groups; empty before prepare and after squash
    pub fn groups(&self) -> &[GroupState] {
        &self.groups
    }

    /// Resolve the config against the model and attach all-ones masks.
    ///
    /// Every linear layer gets exactly one group. No sparsity is applied
    /// until the first `step`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, on an override naming a layer the
    /// model does not have, or when called again without an intervening
    /// `squash_masks`.
    pub fn prepare(&mut self, model: &mut Sequential) -> Result<(), SparsityError> {
        if self.prepared {
            return Err(SparsityError::AlreadyPrepared);
        }
        self.config.validate()?;
        let groups = self.config.resolve(&model.linear_names())?;

        for group in &groups {
            let layer = model
                .linear_mut(&group.layer)
                .ok_or_else(|| SparsityError::UnknownLayer(group.layer.clone()))?;
            let (rows, cols) = layer.weight().dim();
            layer.attach_mask(SparsityMask::ones(rows, cols))?;
        }

        self.groups = groups.into_iter().map(|group| GroupState { group, scale: 1.0 }).collect();
        self.prepared = true;
        Ok(())
    }

    /// Recompute every group's mask at its current effective level.
    pub fn step(&mut self, model: &mut Sequential) -> Result<(), SparsityError> {
        if !self.prepared {
            return Err(SparsityError::NotPrepared);
        }
        for state in &self.groups {
            let layer = model
                .linear_mut(state.layer())
                .ok_or_else(|| SparsityError::UnknownLayer(state.layer().to_string()))?;
            let mask = self.update.update_mask(
                layer.weight().view(),
                state.effective_level(),
                state.group(),
            );
            layer.attach_mask(mask)?;
        }
        Ok(())
    }

    /// Fold every mask into its weight and return to the unprepared state.
    ///
    /// The zero fraction of each weight afterwards equals the sparsity the
    /// mask last encoded. Layers keep a record of their block shape for
    /// kernel selection. Re-preparing afterwards is allowed and attaches
    /// fresh all-ones masks.
    pub fn squash_masks(&mut self, model: &mut Sequential) -> Result<(), SparsityError> {
        if !self.prepared {
            return Err(SparsityError::NotPrepared);
        }
        for state in &self.groups {
            let layer = model
                .linear_mut(state.layer())
                .ok_or_else(|| SparsityError::UnknownLayer(state.layer().to_string()))?;
            layer.squash_mask();
            layer.set_sparse_block_shape(state.group().settings.block_shape);
        }
        self.groups.clear();
        self.prepared = false;
        Ok(())
    }

    /// Set every group's scaling factor, clamped to [0, 1].
    pub fn set_scale(&mut self, scale: f32) {
        let scale = scale.clamp(0.0, 1.0);
        for state in &mut self.groups {
            state.scale = scale;
        }
    }

    /// Set one group's scaling factor, clamped to [0, 1].
    pub fn set_group_scale(&mut self, layer: &str, scale: f32) -> Result<(), SparsityError> {
        let state = self
            .groups
            .iter_mut()
            .find(|s| s.layer() == layer)
            .ok_or_else(|| SparsityError::UnknownLayer(layer.to_string()))?;
        state.scale = scale.clamp(0.0, 1.0);
        Ok(())
    }

    /// Current scaling factor per group
    pub fn group_scales(&self) -> Vec<(String, f32)> {
        self.groups
            .iter()
            .map(|s| (s.layer().to_string(), s.scale()))
            .collect()
    }

    /// Effective level per group for the next step
    pub fn effective_levels(&self) -> Vec<(String, f32)> {
        self.groups
            .iter()
            .map(|s| (s.layer().to_string(), s.effective_level()))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
