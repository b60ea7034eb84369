//! Sparsity configuration groups
//!
//! A configuration is a default settings group plus per-layer overrides.
//! Resolving a configuration against a model produces exactly one group per
//! linear layer, with overrides taking precedence over the defaults.

use crate::sparsity::SparsityError;
use serde::{Deserialize, Serialize};

fn default_sparsity_level() -> f32 {
    0.5
}

fn default_block_shape() -> (usize, usize) {
    (1, 4)
}

fn default_zeros_per_block() -> usize {
    4
}

/// Sparsity settings shared by a group of layers.
///
/// Defaults match the stock sparsifier: half the blocks selected, 1x4
/// blocks, all four entries of a selected block zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Target fraction of blocks to sparsify, in [0.0, 1.0].
    #[serde(default = "default_sparsity_level")]
    pub sparsity_level: f32,

    /// Block shape as (rows, cols); blocks are ranked as a unit.
    #[serde(default = "default_block_shape")]
    pub block_shape: (usize, usize),

    /// Entries zeroed inside each selected block.
    #[serde(default = "default_zeros_per_block")]
    pub zeros_per_block: usize,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            sparsity_level: default_sparsity_level(),
            block_shape: default_block_shape(),
            zeros_per_block: default_zeros_per_block(),
        }
    }
}

impl GroupSettings {
    /// Number of entries in one block
    pub fn block_elements(&self) -> usize {
        self.block_shape.0 * self.block_shape.1
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), SparsityError> {
        if !(0.0..=1.0).contains(&self.sparsity_level) {
            return Err(SparsityError::LevelOutOfRange(self.sparsity_level));
        }
        let (h, w) = self.block_shape;
        if h == 0 || w == 0 {
            return Err(SparsityError::EmptyBlock(h, w));
        }
        if self.zeros_per_block > self.block_elements() {
            return Err(SparsityError::ZerosExceedBlock {
                zeros: self.zeros_per_block,
                capacity: self.block_elements(),
            });
        }
        Ok(())
    }
}

/// Per-layer sparsity group: a target layer plus its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsityGroup {
    /// Name of the linear layer this group targets.
    pub layer: String,

    /// Settings applied to the layer.
    #[serde(flatten)]
    pub settings: GroupSettings,
}

impl SparsityGroup {
    /// Create a group with the stock settings for `layer`
    pub fn new(layer: impl Into<String>) -> Self {
        Self { layer: layer.into(), settings: GroupSettings::default() }
    }

    /// Set the sparsity level.
    pub fn with_level(mut self, level: f32) -> Self {
        self.settings.sparsity_level = level.clamp(0.0, 1.0);
        self
    }

    /// Set the block shape.
    pub fn with_block_shape(mut self, rows: usize, cols: usize) -> Self {
        self.settings.block_shape = (rows, cols);
        self
    }

    /// Set the zeros-per-block count.
    pub fn with_zeros_per_block(mut self, zeros: usize) -> Self {
        self.settings.zeros_per_block = zeros;
        self
    }
}

/// Sparsity configuration: defaults plus per-layer overrides.
///
/// # Example
///
/// ```
/// use podar::sparsity::{SparsityConfig, SparsityGroup};
///
/// let config = SparsityConfig::new()
///     .with_level(0.5)
///     .with_block_shape(1, 4)
///     .with_override(SparsityGroup::new("linear").with_level(0.25));
///
/// assert_eq!(config.settings_for("linear").sparsity_level, 0.25);
/// assert_eq!(config.settings_for("seq.0").sparsity_level, 0.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparsityConfig {
    /// Settings applied to any layer without an explicit override.
    #[serde(default)]
    defaults: GroupSettings,

    /// Per-layer overrides.
    #[serde(default)]
    overrides: Vec<SparsityGroup>,
}

impl SparsityConfig {
    /// Create a configuration with the stock defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default settings group.
    pub fn with_defaults(mut self, settings: GroupSettings) -> Self {
        self.defaults = settings;
        self
    }

    /// Set the default sparsity level.
    pub fn with_level(mut self, level: f32) -> Self {
        self.defaults.sparsity_level = level.clamp(0.0, 1.0);
        self
    }

    /// Set the default block shape.
    pub fn with_block_shape(mut self, rows: usize, cols: usize) -> Self {
        self.defaults.block_shape = (rows, cols);
        self
    }

    /// Set the default zeros-per-block count.
    pub fn with_zeros_per_block(mut self, zeros: usize) -> Self {
        self.defaults.zeros_per_block = zeros;
        self
    }

    /// Add a per-layer override.
    pub fn with_override(mut self, group: SparsityGroup) -> Self {
        self.overrides.push(group);
        self
    }

    /// Get the default settings group.
    pub fn defaults(&self) -> &GroupSettings {
        &self.defaults
    }

    /// Get the per-layer overrides.
    pub fn overrides(&self) -> &[SparsityGroup] {
        &self.overrides
    }

    /// Get the override for `layer`, if any.
    pub fn override_for(&self, layer: &str) -> Option<&SparsityGroup> {
        self.overrides.iter().find(|g| g.layer == layer)
    }

    /// Settings that apply to `layer` (override or defaults).
    pub fn settings_for(&self, layer: &str) -> GroupSettings {
        self.override_for(layer).map_or(self.defaults, |g| g.settings)
    }

    /// Validate the defaults and every override.
    pub fn validate(&self) -> Result<(), SparsityError> {
        self.defaults.validate()?;
        for (i, group) in self.overrides.iter().enumerate() {
            group.settings.validate()?;
            if self.overrides[..i].iter().any(|g| g.layer == group.layer) {
                return Err(SparsityError::DuplicateOverride(group.layer.clone()));
            }
        }
        Ok(())
    }

    /// Resolve the configuration against a model's layer names.
    ///
    /// Produces one group per name, in model order. An override naming a
    /// layer not present in `layers` is an error.
    pub fn resolve(&self, layers: &[String]) -> Result<Vec<SparsityGroup>, SparsityError> {
        for group in &self.overrides {
            if !layers.contains(&group.layer) {
                return Err(SparsityError::UnknownLayer(group.layer.clone()));
            }
        }
        Ok(layers
            .iter()
            .map(|name| SparsityGroup {
                layer: name.clone(),
                settings: self.settings_for(name),
            })
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // GroupSettings Tests
    // =========================================================================

    #[test]
    fn test_settings_default_values() {
        // TEST_ID: SPC-001
        let settings = GroupSettings::default();
        assert!(
            (settings.sparsity_level - 0.5).abs() < 1e-6,
            "SPC-001 FALSIFIED: Default level should be 0.5"
        );
        assert_eq!(
            settings.block_shape,
            (1, 4),
            "SPC-001 FALSIFIED: Default block shape should be (1, 4)"
        );
        assert_eq!(
            settings.zeros_per_block, 4,
            "SPC-001 FALSIFIED: Default zeros_per_block should be 4"
        );
        assert_eq!(settings.block_elements(), 4);
    }

    #[test]
    fn test_settings_validate_level_range() {
        // TEST_ID: SPC-002
        let mut settings = GroupSettings::default();
        settings.sparsity_level = 1.5;
        assert!(
            settings.validate().is_err(),
            "SPC-002 FALSIFIED: Level above 1.0 should be invalid"
        );

        settings.sparsity_level = -0.1;
        assert!(
            settings.validate().is_err(),
            "SPC-002 FALSIFIED: Negative level should be invalid"
        );

        settings.sparsity_level = 1.0;
        assert!(
            settings.validate().is_ok(),
            "SPC-002 FALSIFIED: Level 1.0 should be valid"
        );
    }

    #[test]
    fn test_settings_validate_empty_block() {
        // TEST_ID: SPC-003
        let mut settings = GroupSettings::default();
        settings.block_shape = (0, 4);
        assert!(
            settings.validate().is_err(),
            "SPC-003 FALSIFIED: Zero block dimension should be invalid"
        );
    }

    #[test]
    fn test_settings_validate_zeros_exceed_block() {
        // TEST_ID: SPC-004
        let mut settings = GroupSettings::default();
        settings.block_shape = (1, 4);
        settings.zeros_per_block = 5;
        assert!(
            settings.validate().is_err(),
            "SPC-004 FALSIFIED: zeros_per_block above block capacity should be invalid"
        );

        settings.zeros_per_block = 4;
        assert!(settings.validate().is_ok());
    }

    // =========================================================================
    // SparsityGroup Tests
    // =========================================================================

    #[test]
    fn test_group_builder() {
        // TEST_ID: SPC-010
        let group = SparsityGroup::new("linear")
            .with_level(0.25)
            .with_block_shape(4, 1)
            .with_zeros_per_block(4);

        assert_eq!(group.layer, "linear");
        assert!((group.settings.sparsity_level - 0.25).abs() < 1e-6);
        assert_eq!(group.settings.block_shape, (4, 1));
        assert_eq!(group.settings.zeros_per_block, 4);
    }

    #[test]
    fn test_group_level_clamped() {
        // TEST_ID: SPC-011
        let group = SparsityGroup::new("w").with_level(2.0);
        assert_eq!(
            group.settings.sparsity_level, 1.0,
            "SPC-011 FALSIFIED: Level should be clamped to 1.0"
        );

        let group = SparsityGroup::new("w").with_level(-1.0);
        assert_eq!(
            group.settings.sparsity_level, 0.0,
            "SPC-011 FALSIFIED: Level should be clamped to 0.0"
        );
    }

    // =========================================================================
    // SparsityConfig Tests
    // =========================================================================

    #[test]
    fn test_config_settings_for_precedence() {
        // TEST_ID: SPC-020
        let config = SparsityConfig::new()
            .with_level(0.5)
            .with_override(SparsityGroup::new("linear").with_level(0.25));

        assert!(
            (config.settings_for("linear").sparsity_level - 0.25).abs() < 1e-6,
            "SPC-020 FALSIFIED: Override should take precedence over defaults"
        );
        assert!(
            (config.settings_for("seq.0").sparsity_level - 0.5).abs() < 1e-6,
            "SPC-020 FALSIFIED: Unlisted layer should get defaults"
        );
    }

    #[test]
    fn test_config_validate_duplicate_override() {
        // TEST_ID: SPC-021
        let config = SparsityConfig::new()
            .with_override(SparsityGroup::new("linear"))
            .with_override(SparsityGroup::new("linear").with_level(0.1));
        assert!(
            config.validate().is_err(),
            "SPC-021 FALSIFIED: Duplicate overrides for one layer should be invalid"
        );
    }

    #[test]
    fn test_config_validate_checks_overrides() {
        // TEST_ID: SPC-022
        let config = SparsityConfig::new()
            .with_override(SparsityGroup::new("linear").with_block_shape(0, 1));
        assert!(
            config.validate().is_err(),
            "SPC-022 FALSIFIED: Invalid override settings should fail validation"
        );
    }

    #[test]
    fn test_config_resolve_one_group_per_layer() {
        // TEST_ID: SPC-023
        let config = SparsityConfig::new()
            .with_level(0.5)
            .with_override(SparsityGroup::new("linear").with_level(0.25));
        let layers = vec!["seq.0".to_string(), "linear".to_string()];

        let groups = config.resolve(&layers).unwrap();
        assert_eq!(groups.len(), 2, "SPC-023 FALSIFIED: One group per layer expected");
        assert_eq!(groups[0].layer, "seq.0");
        assert!((groups[0].settings.sparsity_level - 0.5).abs() < 1e-6);
        assert_eq!(groups[1].layer, "linear");
        assert!((groups[1].settings.sparsity_level - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_config_resolve_unknown_layer() {
        // TEST_ID: SPC-024
        // FALSIFIES: Overrides silently ignore layers missing from the model
        let config = SparsityConfig::new().with_override(SparsityGroup::new("missing"));
        let layers = vec!["seq.0".to_string()];

        let err = config.resolve(&layers).unwrap_err();
        assert!(
            format!("{err}").contains("missing"),
            "SPC-024 FALSIFIED: Unknown layer error should name the layer"
        );
    }

    // =========================================================================
    // Serialization Tests
    // =========================================================================

    #[test]
    fn test_config_serialize_yaml() {
        // TEST_ID: SPC-030
        let config = SparsityConfig::new()
            .with_level(0.8)
            .with_override(SparsityGroup::new("linear").with_level(0.25));

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("sparsity_level"));
        assert!(yaml.contains("linear"));

        let back: SparsityConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config, "SPC-030 FALSIFIED: YAML round trip should preserve config");
    }

    #[test]
    fn test_config_deserialize_partial_yaml() {
        // TEST_ID: SPC-031
        // Omitted fields fall back to the stock defaults
        let yaml = r"
defaults:
  sparsity_level: 0.7
overrides:
  - layer: linear
    block_shape: [4, 1]
";
        let config: SparsityConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((config.defaults().sparsity_level - 0.7).abs() < 1e-6);
        assert_eq!(config.defaults().block_shape, (1, 4));

        let group = config.override_for("linear").unwrap();
        assert_eq!(group.settings.block_shape, (4, 1));
        assert!(
            (group.settings.sparsity_level - 0.5).abs() < 1e-6,
            "SPC-031 FALSIFIED: Omitted override level should default to 0.5"
        );
    }

    #[test]
    fn test_config_deserialize_empty_yaml() {
        // TEST_ID: SPC-032
        let config: SparsityConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SparsityConfig::default());
    }
}
