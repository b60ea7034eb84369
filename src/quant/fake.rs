//! Fake quantization for quantization-aware passes
//!
//! Runs values through an 8-bit quantize/dequantize round trip while
//! keeping them in floating point, so a model can be exercised with
//! quantization error present before it is actually converted.

use crate::quant::{Observer, QuantParams};
use ndarray::{Array1, Array2};

/// Simulates 8-bit precision on floating point values.
///
/// Starts uncalibrated with identity-like parameters; `calibrate` fits the
/// parameters to data, and `forward_with_calibration` does so lazily on
/// first use.
#[derive(Debug, Clone)]
pub struct FakeQuantize {
    symmetric: bool,
    params: QuantParams,
    initialized: bool,
}

impl FakeQuantize {
    /// Symmetric signed 8-bit simulation, typical for weights.
    pub fn symmetric() -> Self {
        Self {
            symmetric: true,
            params: QuantParams::uncalibrated(),
            initialized: false,
        }
    }

    /// Asymmetric unsigned 8-bit simulation, typical for activations.
    pub fn affine() -> Self {
        Self {
            symmetric: false,
            params: QuantParams::uncalibrated(),
            initialized: false,
        }
    }

    /// Fit parameters to the min-max range of `data`. Empty data leaves the
    /// state untouched.
    pub fn calibrate(&mut self, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        let mut observer = Observer::min_max(self.symmetric);
        observer.observe(data);
        self.params = observer.compute();
        self.initialized = true;
    }

    pub fn forward_slice(&self, data: &[f32]) -> Vec<f32> {
        data.iter().map(|&x| self.params.fake_quantize(x)).collect()
    }

    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        input.mapv(|x| self.params.fake_quantize(x))
    }

    /// Apply the round trip to a weight matrix, e.g. a layer's effective
    /// weight while its sparsifier is still stepping.
    pub fn forward_array2(&self, weight: &Array2<f32>) -> Array2<f32> {
        weight.mapv(|x| self.params.fake_quantize(x))
    }

    /// Forward pass that calibrates from the input on first use.
    pub fn forward_with_calibration(&mut self, input: &Array1<f32>) -> Array1<f32> {
        if !self.initialized {
            self.calibrate(input.as_slice().unwrap_or(&[]));
        }
        self.forward(input)
    }

    pub fn params(&self) -> &QuantParams {
        &self.params
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
