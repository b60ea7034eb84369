//! Post-training quantization: calibrate then convert
//!
//! Calibration runs representative inputs through the model and records
//! the value range entering each linear layer. Conversion consumes those
//! ranges, quantizes every linear layer's effective weights to 8 bits,
//! and swaps the layers in place. Activation layers are untouched, and
//! layers pruned with a known block shape are tagged with the matching
//! sparse kernel.

use crate::nn::{Layer, Sequential};
use crate::quant::{
    KernelTable, Observer, QuantConfig, QuantError, QuantLinear, QuantParams, WeightScheme,
};
use ndarray::{Array1, Array2};

/// Per-layer input ranges recorded by [`calibrate`].
#[derive(Debug, Clone)]
pub struct Calibration {
    activations: Vec<(String, QuantParams)>,
    num_batches: usize,
}

impl Calibration {
    /// Activation parameters for a linear layer, if it was seen during
    /// calibration.
    pub fn activation_for(&self, layer: &str) -> Option<&QuantParams> {
        self.activations
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, params)| params)
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.activations.iter().map(|(name, _)| name.as_str())
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }
}

/// Record the input range of every linear layer over the given batches.
///
/// # Errors
///
/// Returns `QuantError::NoCalibrationData` when `batches` is empty, or an
/// observer configuration error from the config.
pub fn calibrate(
    model: &Sequential,
    batches: &[Array1<f32>],
    config: &QuantConfig,
) -> Result<Calibration, QuantError> {
    config.validate()?;
    if batches.is_empty() {
        return Err(QuantError::NoCalibrationData);
    }

    // Activations use asymmetric parameters so one-sided ranges, like the
    // output of a ReLU, keep their full resolution
    let make_observer = || match config.momentum() {
        Some(momentum) => Observer::moving_average(false, momentum),
        None => Observer::min_max(false),
    };

    let mut observers: Vec<(String, Observer)> = model
        .layers()
        .iter()
        .filter(|(_, layer)| matches!(layer, Layer::Linear(_)))
        .map(|(name, _)| (name.clone(), make_observer()))
        .collect();

    for batch in batches {
        let mut current = batch.clone();
        for (name, layer) in model.layers() {
            if matches!(layer, Layer::Linear(_)) {
                if let Some((_, observer)) = observers.iter_mut().find(|(n, _)| n == name) {
                    observer.observe(current.as_slice().unwrap_or(&[]));
                }
            }
            current = layer.forward(&current);
        }
    }

    Ok(Calibration {
        activations: observers
            .into_iter()
            .map(|(name, observer)| (name, observer.compute()))
            .collect(),
        num_batches: batches.len(),
    })
}

fn value_range<'a>(values: impl Iterator<Item = &'a f32>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

fn fit_weight_params(min: f32, max: f32, symmetric: bool) -> QuantParams {
    if symmetric {
        QuantParams::symmetric(min.abs().max(max.abs()))
    } else {
        QuantParams::affine_signed(min, max)
    }
}

fn quantize_weights(weight: &Array2<f32>, config: &QuantConfig) -> (Array2<i8>, WeightScheme) {
    let symmetric = config.symmetric_weights();
    if config.per_channel() {
        let params: Vec<QuantParams> = weight
            .outer_iter()
            .map(|row| {
                let (min, max) = value_range(row.iter());
                fit_weight_params(min, max, symmetric)
            })
            .collect();
        let qweight =
            Array2::from_shape_fn(weight.dim(), |(r, c)| params[r].quantize(weight[[r, c]]) as i8);
        (qweight, WeightScheme::PerChannel(params))
    } else {
        let (min, max) = value_range(weight.iter());
        let params = fit_weight_params(min, max, symmetric);
        let qweight = weight.mapv(|w| params.quantize(w) as i8);
        (qweight, WeightScheme::PerTensor(params))
    }
}

/// Swap every linear layer for its 8-bit counterpart.
///
/// Weights are quantized from the layer's effective weights, so attached
/// masks are honored whether or not they were squashed first. The kernel
/// table is consulted with each layer's recorded block shape.
///
/// # Errors
///
/// Returns `QuantError::NotCalibrated` when a linear layer has no entry in
/// the calibration.
pub fn convert(
    mut model: Sequential,
    calibration: &Calibration,
    config: &QuantConfig,
    kernels: &KernelTable,
) -> Result<Sequential, QuantError> {
    config.validate()?;
    for (name, layer) in model.layers_mut() {
        if let Layer::Linear(linear) = layer {
            let activation = calibration
                .activation_for(name)
                .copied()
                .ok_or_else(|| QuantError::NotCalibrated(name.to_string()))?;
            let weight = linear.effective_weight();
            let (qweight, scheme) = quantize_weights(&weight, config);
            let kernel = kernels.resolve(linear.sparse_block_shape());
            let quantized =
                QuantLinear::new(qweight, scheme, linear.bias().clone(), activation, kernel);
            *layer = Layer::QuantLinear(quantized);
        }
    }
    Ok(model)
}
