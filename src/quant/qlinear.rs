//! Quantized fully connected layer

use crate::quant::{QuantParams, SparseKernel, WeightScheme};
use ndarray::{Array1, Array2};

/// Linear layer with 8-bit integer weights.
///
/// Weights are stored as `i8` with their quantization scheme; the bias
/// stays in f32. The forward pass dequantizes and computes in floating
/// point, so outputs carry quantization error but no integer kernels are
/// required. The activation parameters record the input range observed
/// during calibration, and the kernel tag records which sparse kernel the
/// layer's block shape resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantLinear {
    qweight: Array2<i8>,
    scheme: WeightScheme,
    bias: Array1<f32>,
    activation: QuantParams,
    kernel: SparseKernel,
}

impl QuantLinear {
    /// # Panics
    ///
    /// Panics when the bias length does not match the weight rows, or a
    /// per-channel scheme does not carry one parameter set per row.
    pub fn new(
        qweight: Array2<i8>,
        scheme: WeightScheme,
        bias: Array1<f32>,
        activation: QuantParams,
        kernel: SparseKernel,
    ) -> Self {
        assert_eq!(
            qweight.nrows(),
            bias.len(),
            "bias length must match weight rows"
        );
        if let WeightScheme::PerChannel(rows) = &scheme {
            assert_eq!(
                rows.len(),
                qweight.nrows(),
                "per-channel scheme must carry one parameter set per row"
            );
        }
        Self {
            qweight,
            scheme,
            bias,
            activation,
            kernel,
        }
    }

    pub fn in_features(&self) -> usize {
        self.qweight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.qweight.nrows()
    }

    pub fn qweight(&self) -> &Array2<i8> {
        &self.qweight
    }

    pub fn scheme(&self) -> &WeightScheme {
        &self.scheme
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    pub fn activation(&self) -> &QuantParams {
        &self.activation
    }

    pub fn kernel(&self) -> SparseKernel {
        self.kernel
    }

    /// Weights mapped back to floating point.
    pub fn dequantized_weight(&self) -> Array2<f32> {
        let (rows, cols) = self.qweight.dim();
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            self.scheme
                .params_for_row(r)
                .dequantize(i32::from(self.qweight[[r, c]]))
        })
    }

    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        self.dequantized_weight().dot(input) + &self.bias
    }

    pub fn num_parameters(&self) -> usize {
        self.qweight.len() + self.bias.len()
    }

    pub fn num_weights(&self) -> usize {
        self.qweight.len()
    }

    /// Count of weights that dequantize to exactly zero.
    pub fn zero_count(&self) -> usize {
        let mut count = 0;
        for (r, row) in self.qweight.outer_iter().enumerate() {
            let zero_point = self.scheme.params_for_row(r).zero_point;
            count += row.iter().filter(|&&q| i32::from(q) == zero_point).count();
        }
        count
    }

    pub fn sparsity(&self) -> f32 {
        if self.qweight.is_empty() {
            return 0.0;
        }
        self.zero_count() as f32 / self.qweight.len() as f32
    }
}
