//! Declarative workflow specification
//!
//! A workflow is described in YAML: the model architecture, the sparsity
//! configuration, a level schedule, and an optional quantization stage.
//! Omitted sections fall back to defaults, so the smallest useful spec is
//! a model plus an output directory.

use crate::nn::{Activation, Linear, Sequential};
use crate::quant::{KernelTable, QuantConfig, SparseKernel};
use crate::sparsity::{
    CubicRamp, LinearRamp, Norm, SparsityConfig, SparsityScheduler,
};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One layer of the model, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Linear {
        name: String,
        in_features: usize,
        out_features: usize,
    },
    Relu {
        name: String,
    },
    Sigmoid {
        name: String,
    },
}

impl LayerSpec {
    pub fn name(&self) -> &str {
        match self {
            LayerSpec::Linear { name, .. }
            | LayerSpec::Relu { name }
            | LayerSpec::Sigmoid { name } => name,
        }
    }
}

fn default_seed() -> u64 {
    0
}

/// Model architecture with a seed for weight initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub layers: Vec<LayerSpec>,
}

impl ModelSpec {
    /// Input width of the first linear layer, if any.
    pub fn input_features(&self) -> Option<usize> {
        self.layers.iter().find_map(|layer| match layer {
            LayerSpec::Linear { in_features, .. } => Some(*in_features),
            _ => None,
        })
    }

    /// Instantiate the model with seeded random weights.
    ///
    /// # Panics
    ///
    /// Panics on duplicate layer names; run [`WorkflowSpec::validate`]
    /// first.
    pub fn build(&self) -> Sequential {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut model = Sequential::new();
        for layer in &self.layers {
            model = match layer {
                LayerSpec::Linear {
                    name,
                    in_features,
                    out_features,
                } => model.with_linear(name, Linear::init(*out_features, *in_features, &mut rng)),
                LayerSpec::Relu { name } => model.with_activation(name, Activation::Relu),
                LayerSpec::Sigmoid { name } => model.with_activation(name, Activation::Sigmoid),
            };
        }
        model
    }
}

/// Sparsity level schedule over workflow steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSpec {
    /// Full configured level at every step.
    None,
    /// Linear interpolation between the two steps.
    LinearRamp { start_step: usize, end_step: usize },
    /// Cubic ramp between the two steps.
    CubicRamp { start_step: usize, end_step: usize },
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        ScheduleSpec::None
    }
}

impl ScheduleSpec {
    /// Build the scheduler, or `None` when no ramp is configured.
    pub fn build(&self) -> Option<Box<dyn SparsityScheduler>> {
        match *self {
            ScheduleSpec::None => None,
            ScheduleSpec::LinearRamp {
                start_step,
                end_step,
            } => Some(Box::new(LinearRamp::new(start_step, end_step))),
            ScheduleSpec::CubicRamp {
                start_step,
                end_step,
            } => Some(Box::new(CubicRamp::new(start_step, end_step))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            ScheduleSpec::None => Ok(()),
            ScheduleSpec::LinearRamp {
                start_step,
                end_step,
            } => Ok(LinearRamp::new(start_step, end_step).validate()?),
            ScheduleSpec::CubicRamp {
                start_step,
                end_step,
            } => Ok(CubicRamp::new(start_step, end_step).validate()?),
        }
    }
}

/// Mask update policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicySpec {
    WeightNorm {
        #[serde(default)]
        norm: Norm,
    },
    Magnitude,
}

impl Default for PolicySpec {
    fn default() -> Self {
        PolicySpec::WeightNorm {
            norm: Norm::default(),
        }
    }
}

/// One kernel table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub block_shape: (usize, usize),
    pub kernel: SparseKernel,
}

fn default_calibration_batches() -> usize {
    8
}

/// Quantization stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSpec {
    #[serde(flatten)]
    pub config: QuantConfig,
    /// Random calibration batches generated from the model seed.
    #[serde(default = "default_calibration_batches")]
    pub calibration_batches: usize,
    /// Kernel table entries. Omitted means the built-in defaults; an
    /// explicit empty list keeps every layer dense.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernels: Option<Vec<KernelSpec>>,
}

impl QuantSpec {
    pub fn kernel_table(&self) -> KernelTable {
        match &self.kernels {
            None => KernelTable::with_defaults(),
            Some(entries) => {
                let mut table = KernelTable::new();
                for entry in entries {
                    table.register(entry.block_shape, entry.kernel);
                }
                table
            }
        }
    }
}

fn default_steps() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Complete workflow: model, sparsity, schedule, optional quantization.
///
/// # Example
///
/// ```
/// use podar::workflow::WorkflowSpec;
///
/// let spec = WorkflowSpec::from_yaml_str(
///     r"
/// model:
///   seed: 42
///   layers:
///     - { type: linear, name: seq.0, in_features: 16, out_features: 16 }
///     - { type: relu, name: seq.1 }
///     - { type: linear, name: linear, in_features: 16, out_features: 16 }
/// steps: 4
/// schedule:
///   type: cubic_ramp
///   start_step: 0
///   end_step: 4
/// ",
/// )
/// .unwrap();
/// spec.validate().unwrap();
/// assert_eq!(spec.steps, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub model: ModelSpec,
    #[serde(default)]
    pub sparsity: SparsityConfig,
    #[serde(default)]
    pub schedule: ScheduleSpec,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub policy: PolicySpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantize: Option<QuantSpec>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl WorkflowSpec {
    /// Parse a workflow from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` on malformed YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))
    }

    /// Read and parse a workflow file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))
    }

    /// Names of linear layers in the model spec, in order.
    pub fn linear_layer_names(&self) -> Vec<String> {
        self.model
            .layers
            .iter()
            .filter(|layer| matches!(layer, LayerSpec::Linear { .. }))
            .map(|layer| layer.name().to_string())
            .collect()
    }

    /// Check the whole spec for problems before running it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Workflow` for structural problems, or the
    /// underlying sparsity, schedule, or quantization error.
    pub fn validate(&self) -> Result<()> {
        if self.model.layers.is_empty() {
            return Err(Error::Workflow("model has no layers".to_string()));
        }
        for (i, layer) in self.model.layers.iter().enumerate() {
            let name = layer.name();
            if name.is_empty() {
                return Err(Error::Workflow(format!("layer {i} has an empty name")));
            }
            if self.model.layers[..i].iter().any(|l| l.name() == name) {
                return Err(Error::Workflow(format!("duplicate layer name: {name}")));
            }
        }

        // Consecutive linear layers must chain dimensionally; activations
        // preserve width
        let mut expected_in: Option<usize> = None;
        for layer in &self.model.layers {
            if let LayerSpec::Linear {
                name,
                in_features,
                out_features,
            } = layer
            {
                if *in_features == 0 || *out_features == 0 {
                    return Err(Error::Workflow(format!(
                        "layer {name} has zero-sized dimensions"
                    )));
                }
                if let Some(expected) = expected_in {
                    if *in_features != expected {
                        return Err(Error::Workflow(format!(
                            "layer {name} expects {in_features} inputs but receives {expected}"
                        )));
                    }
                }
                expected_in = Some(*out_features);
            }
        }

        if self.steps == 0 {
            return Err(Error::Workflow("steps must be at least 1".to_string()));
        }

        self.sparsity.validate()?;
        let linear_names = self.linear_layer_names();
        for group in self.sparsity.overrides() {
            if !linear_names.iter().any(|n| n == &group.layer) {
                return Err(crate::sparsity::SparsityError::UnknownLayer(group.layer.clone()).into());
            }
        }

        self.schedule.validate()?;

        if let Some(quant) = &self.quantize {
            quant.config.validate()?;
            if quant.calibration_batches == 0 {
                return Err(Error::Workflow(
                    "calibration_batches must be at least 1".to_string(),
                ));
            }
            if self.model.input_features().is_none() {
                return Err(Error::Workflow(
                    "quantization requires at least one linear layer".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r"
model:
  layers:
    - { type: linear, name: fc, in_features: 8, out_features: 4 }
"
    }

    #[test]
    fn test_minimal_spec_uses_defaults() {
        let spec = WorkflowSpec::from_yaml_str(minimal_yaml()).unwrap();
        assert_eq!(spec.model.seed, 0);
        assert_eq!(spec.steps, 1);
        assert_eq!(spec.schedule, ScheduleSpec::None);
        assert_eq!(spec.policy, PolicySpec::default());
        assert!(spec.quantize.is_none());
        assert_eq!(spec.output_dir, PathBuf::from("artifacts"));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_full_spec_parses() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  seed: 7
  layers:
    - { type: linear, name: seq.0, in_features: 16, out_features: 16 }
    - { type: relu, name: seq.1 }
    - { type: linear, name: linear, in_features: 16, out_features: 16 }
sparsity:
  defaults:
    sparsity_level: 0.6
  overrides:
    - layer: linear
      sparsity_level: 0.3
schedule:
  type: linear_ramp
  start_step: 0
  end_step: 8
steps: 8
policy:
  type: weight_norm
  norm: l1
quantize:
  per_channel: true
  calibration_batches: 4
  kernels:
    - { block_shape: [1, 4], kernel: block_row }
output_dir: /tmp/run
",
        )
        .unwrap();

        spec.validate().unwrap();
        assert_eq!(spec.model.seed, 7);
        assert_eq!(spec.sparsity.defaults().sparsity_level, 0.6);
        assert_eq!(spec.sparsity.overrides().len(), 1);
        assert_eq!(spec.policy, PolicySpec::WeightNorm { norm: Norm::L1 });
        let quant = spec.quantize.as_ref().unwrap();
        assert!(quant.config.per_channel());
        assert_eq!(quant.calibration_batches, 4);
        assert_eq!(quant.kernel_table().len(), 1);
    }

    #[test]
    fn test_model_build_is_seeded() {
        let spec = WorkflowSpec::from_yaml_str(minimal_yaml()).unwrap();
        let a = spec.model.build();
        let b = spec.model.build();
        assert_eq!(a.linear("fc").unwrap().weight(), b.linear("fc").unwrap().weight());
        assert_eq!(a.linear("fc").unwrap().in_features(), 8);
        assert_eq!(a.linear("fc").unwrap().out_features(), 4);
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  layers:
    - { type: linear, name: fc, in_features: 4, out_features: 4 }
    - { type: relu, name: fc }
",
        )
        .unwrap();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  layers:
    - { type: linear, name: a, in_features: 4, out_features: 8 }
    - { type: linear, name: b, in_features: 4, out_features: 2 }
",
        )
        .unwrap();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("receives"));
    }

    #[test]
    fn test_validate_rejects_unknown_override() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  layers:
    - { type: linear, name: fc, in_features: 4, out_features: 4 }
sparsity:
  overrides:
    - layer: missing
",
        )
        .unwrap();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_validate_rejects_empty_ramp() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  layers:
    - { type: linear, name: fc, in_features: 4, out_features: 4 }
schedule:
  type: cubic_ramp
  start_step: 5
  end_step: 5
",
        )
        .unwrap();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let spec = WorkflowSpec::from_yaml_str(
            r"
model:
  layers:
    - { type: linear, name: fc, in_features: 4, out_features: 4 }
steps: 0
",
        )
        .unwrap();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_kernel_table_default_versus_explicit_empty() {
        let with_defaults: QuantSpec = serde_yaml::from_str("{}").unwrap();
        assert!(!with_defaults.kernel_table().is_empty());

        let explicit_empty: QuantSpec = serde_yaml::from_str("kernels: []").unwrap();
        assert!(explicit_empty.kernel_table().is_empty());
    }

    #[test]
    fn test_yaml_round_trip() {
        let spec = WorkflowSpec::from_yaml_str(minimal_yaml()).unwrap();
        let yaml = spec.to_yaml_string().unwrap();
        let reparsed = WorkflowSpec::from_yaml_str(&yaml).unwrap();
        assert_eq!(spec, reparsed);
    }
}
