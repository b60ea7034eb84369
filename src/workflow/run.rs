//! Workflow execution
//!
//! Runs a parsed [`WorkflowSpec`] end to end: build the model, prepare
//! the sparsifier, step the masks under the schedule, squash, then
//! optionally calibrate, convert, and save the quantized model next to
//! the dense one.

use crate::nn::{Sequential, SparsityReport};
use crate::quant::{calibrate, convert};
use crate::sparsity::{
    Magnitude, MaskUpdate, Sparsifier, SparsityGroup, SparsityMask, WeightNorm,
};
use crate::workflow::{PolicySpec, WorkflowSpec};
use crate::{io, Result};
use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime policy dispatch for the configured mask policy.
#[derive(Debug, Clone)]
pub enum MaskPolicy {
    WeightNorm(WeightNorm),
    Magnitude(Magnitude),
}

impl From<PolicySpec> for MaskPolicy {
    fn from(spec: PolicySpec) -> Self {
        match spec {
            PolicySpec::WeightNorm { norm } => MaskPolicy::WeightNorm(WeightNorm::new(norm)),
            PolicySpec::Magnitude => MaskPolicy::Magnitude(Magnitude),
        }
    }
}

impl MaskUpdate for MaskPolicy {
    fn update_mask(
        &self,
        weight: ArrayView2<'_, f32>,
        level: f32,
        group: &SparsityGroup,
    ) -> SparsityMask {
        match self {
            MaskPolicy::WeightNorm(policy) => policy.update_mask(weight, level, group),
            MaskPolicy::Magnitude(policy) => policy.update_mask(weight, level, group),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MaskPolicy::WeightNorm(policy) => policy.name(),
            MaskPolicy::Magnitude(policy) => policy.name(),
        }
    }
}

/// What a workflow run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub steps_run: usize,
    /// Schedule scale in effect during the final mask update.
    pub final_scale: f32,
    pub sparsity: SparsityReport,
    pub dense_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantized_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<io::SizeReport>,
}

/// Execute a workflow and write its artifacts to the spec's output
/// directory.
///
/// # Errors
///
/// Returns the first validation, sparsity, quantization, or I/O error
/// encountered.
pub fn run_workflow(spec: &WorkflowSpec) -> Result<WorkflowReport> {
    spec.validate()?;

    let mut model = spec.model.build();
    let policy = MaskPolicy::from(spec.policy);
    let mut sparsifier = Sparsifier::new(policy, spec.sparsity.clone());
    let mut scheduler = spec.schedule.build();

    sparsifier.prepare(&mut model)?;
    let mut final_scale = 1.0;
    for _ in 0..spec.steps {
        if let Some(sched) = scheduler.as_deref_mut() {
            final_scale = sched.get_sl();
            sparsifier.set_scale(final_scale);
        }
        sparsifier.step(&mut model)?;
        if let Some(sched) = scheduler.as_deref_mut() {
            sched.step();
        }
    }
    sparsifier.squash_masks(&mut model)?;

    let sparsity = model.sparsity_report();

    std::fs::create_dir_all(&spec.output_dir)?;
    let dense_path = spec.output_dir.join("model.safetensors");
    io::save_model(&model, &dense_path)?;

    let mut quantized_path = None;
    let mut sizes = None;
    if let Some(quant) = &spec.quantize {
        let input_features = spec
            .model
            .input_features()
            .ok_or_else(|| crate::Error::Workflow("no linear layer to calibrate".to_string()))?;

        // Separate stream from weight initialization
        let mut rng = StdRng::seed_from_u64(spec.model.seed.wrapping_add(1));
        let batches: Vec<Array1<f32>> = (0..quant.calibration_batches)
            .map(|_| {
                Array1::from_shape_fn(input_features, |_| -1.0 + rng.random::<f32>() * 2.0)
            })
            .collect();

        let calibration = calibrate(&model, &batches, &quant.config)?;
        let table = quant.kernel_table();
        let converted = convert(model, &calibration, &quant.config, &table)?;

        let path = spec.output_dir.join("model_int8.safetensors");
        io::save_quantized(&converted, &path)?;
        sizes = Some(io::compare_sizes(&dense_path, &path)?);
        quantized_path = Some(path);
    }

    Ok(WorkflowReport {
        steps_run: spec.steps,
        final_scale,
        sparsity,
        dense_path,
        quantized_path,
        sizes,
    })
}

// =============================================================================
// Tests
// =============================================================================
