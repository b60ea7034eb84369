//! Affine quantization parameters and conversion settings

use crate::quant::QuantError;
use serde::{Deserialize, Serialize};

/// Smallest representable scale, guards against division by zero.
const MIN_SCALE: f32 = 1e-10;

/// Affine quantization parameters: `q = round(x / scale) + zero_point`
/// clamped into `[qmin, qmax]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
    pub qmin: i32,
    pub qmax: i32,
}

impl QuantParams {
    /// Symmetric signed 8-bit parameters from a maximum absolute value.
    ///
    /// Range `[-127, 127]` with zero point 0, so 0.0 quantizes to exactly 0.
    pub fn symmetric(max_abs: f32) -> Self {
        let scale = (max_abs / 127.0).max(MIN_SCALE);
        Self {
            scale,
            zero_point: 0,
            qmin: -127,
            qmax: 127,
        }
    }

    /// Asymmetric unsigned 8-bit parameters from an observed range.
    ///
    /// Range `[0, 255]`, used for activations.
    pub fn affine(min: f32, max: f32) -> Self {
        let scale = ((max - min) / 255.0).max(MIN_SCALE);
        let zero_point = (-min / scale).round() as i32;
        Self {
            scale,
            zero_point: zero_point.clamp(0, 255),
            qmin: 0,
            qmax: 255,
        }
    }

    /// Asymmetric signed 8-bit parameters from an observed range.
    ///
    /// Range `[-128, 127]`, used for weights when symmetric quantization
    /// is disabled.
    pub fn affine_signed(min: f32, max: f32) -> Self {
        let scale = ((max - min) / 255.0).max(MIN_SCALE);
        let zero_point = (-128.0 - min / scale).round() as i32;
        Self {
            scale,
            zero_point: zero_point.clamp(-128, 127),
            qmin: -128,
            qmax: 127,
        }
    }

    /// Identity parameters used before calibration.
    pub fn uncalibrated() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
            qmin: -127,
            qmax: 127,
        }
    }

    /// Quantize a value into the integer range.
    pub fn quantize(&self, x: f32) -> i32 {
        ((x / self.scale) + self.zero_point as f32)
            .round()
            .clamp(self.qmin as f32, self.qmax as f32) as i32
    }

    /// Map a quantized value back to floating point.
    pub fn dequantize(&self, q: i32) -> f32 {
        (q - self.zero_point) as f32 * self.scale
    }

    /// Quantize then dequantize, simulating 8-bit precision in f32.
    pub fn fake_quantize(&self, x: f32) -> f32 {
        self.dequantize(self.quantize(x))
    }

    pub fn num_levels(&self) -> usize {
        (self.qmax - self.qmin + 1) as usize
    }
}

/// Weight quantization granularity with its fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// One set of parameters for the whole weight matrix.
    PerTensor(QuantParams),
    /// One set of parameters per output row.
    PerChannel(Vec<QuantParams>),
}

impl WeightScheme {
    /// Parameters governing the given output row.
    pub fn params_for_row(&self, row: usize) -> &QuantParams {
        match self {
            WeightScheme::PerTensor(params) => params,
            WeightScheme::PerChannel(rows) => &rows[row],
        }
    }

    pub fn is_per_channel(&self) -> bool {
        matches!(self, WeightScheme::PerChannel(_))
    }

    /// Scale per output row, expanded for per-tensor schemes.
    pub fn row_scales(&self, num_rows: usize) -> Vec<f32> {
        match self {
            WeightScheme::PerTensor(params) => vec![params.scale; num_rows],
            WeightScheme::PerChannel(rows) => rows.iter().map(|p| p.scale).collect(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WeightScheme::PerTensor(_) => "per_tensor",
            WeightScheme::PerChannel(_) => "per_channel",
        }
    }
}

fn default_symmetric_weights() -> bool {
    true
}

/// Settings for calibration and conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QuantConfig {
    /// Quantize weights with one scale per output row.
    #[serde(default)]
    per_channel: bool,
    /// Use symmetric parameters for weights. Symmetric weights keep
    /// squashed zeros exactly zero after quantization.
    #[serde(default = "default_symmetric_weights")]
    symmetric_weights: bool,
    /// Moving-average observer momentum. Unset means plain min-max.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    momentum: Option<f32>,
}

impl Default for QuantConfig {
    fn default() -> Self {
        Self {
            per_channel: false,
            symmetric_weights: true,
            momentum: None,
        }
    }
}

impl QuantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_per_channel(mut self, per_channel: bool) -> Self {
        self.per_channel = per_channel;
        self
    }

    pub fn with_symmetric_weights(mut self, symmetric: bool) -> Self {
        self.symmetric_weights = symmetric;
        self
    }

    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = Some(momentum);
        self
    }

    pub fn per_channel(&self) -> bool {
        self.per_channel
    }

    pub fn symmetric_weights(&self) -> bool {
        self.symmetric_weights
    }

    pub fn momentum(&self) -> Option<f32> {
        self.momentum
    }

    /// Check observer settings.
    ///
    /// # Errors
    ///
    /// Returns `QuantError::InvalidMomentum` when momentum falls outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<(), QuantError> {
        if let Some(momentum) = self.momentum {
            if !(0.0..=1.0).contains(&momentum) {
                return Err(QuantError::InvalidMomentum(momentum));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_symmetric_zero_point_is_zero() {
        let params = QuantParams::symmetric(2.54);
        assert_eq!(params.zero_point, 0);
        assert_abs_diff_eq!(params.scale, 2.54 / 127.0, epsilon = 1e-9);
        assert_eq!(params.quantize(0.0), 0);
        assert_eq!(params.dequantize(0), 0.0);
    }

    #[test]
    fn test_symmetric_round_trip_extremes() {
        let params = QuantParams::symmetric(1.0);
        assert_eq!(params.quantize(1.0), 127);
        assert_eq!(params.quantize(-1.0), -127);
        // Out-of-range values clamp
        assert_eq!(params.quantize(10.0), 127);
        assert_abs_diff_eq!(params.dequantize(127), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_affine_covers_range() {
        let params = QuantParams::affine(-1.0, 3.0);
        assert_eq!(params.quantize(-1.0), 0);
        assert_eq!(params.quantize(3.0), 255);
        // Round trip error bounded by half a step
        let x = 1.37;
        assert!((params.fake_quantize(x) - x).abs() <= params.scale / 2.0 + 1e-6);
    }

    #[test]
    fn test_affine_signed_range() {
        let params = QuantParams::affine_signed(-0.5, 0.5);
        assert_eq!(params.quantize(-0.5), -128);
        assert_eq!(params.quantize(0.5), 127);
    }

    #[test]
    fn test_degenerate_range_uses_scale_floor() {
        let params = QuantParams::symmetric(0.0);
        assert!(params.scale > 0.0);
        assert_eq!(params.quantize(0.0), 0);

        let params = QuantParams::affine(2.0, 2.0);
        assert!(params.scale > 0.0);
    }

    #[test]
    fn test_fake_quantize_is_idempotent() {
        let params = QuantParams::symmetric(4.0);
        let once = params.fake_quantize(1.234);
        let twice = params.fake_quantize(once);
        assert_abs_diff_eq!(once, twice, epsilon = 1e-9);
    }

    #[test]
    fn test_scheme_row_lookup() {
        let per_tensor = WeightScheme::PerTensor(QuantParams::symmetric(1.0));
        assert_eq!(per_tensor.params_for_row(0), per_tensor.params_for_row(5));
        assert!(!per_tensor.is_per_channel());
        assert_eq!(per_tensor.row_scales(3).len(), 3);

        let per_channel = WeightScheme::PerChannel(vec![
            QuantParams::symmetric(1.0),
            QuantParams::symmetric(2.0),
        ]);
        assert!(per_channel.is_per_channel());
        assert!(per_channel.params_for_row(1).scale > per_channel.params_for_row(0).scale);
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = QuantConfig::new();
        assert!(!config.per_channel());
        assert!(config.symmetric_weights());
        assert!(config.momentum().is_none());
        assert!(config.validate().is_ok());

        let config = QuantConfig::new().with_momentum(0.9);
        assert!(config.validate().is_ok());

        let config = QuantConfig::new().with_momentum(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_yaml_defaults() {
        let config: QuantConfig = serde_yaml::from_str("per_channel: true").unwrap();
        assert!(config.per_channel());
        assert!(config.symmetric_weights());
        assert!(config.momentum().is_none());
    }
}
