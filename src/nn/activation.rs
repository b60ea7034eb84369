//! Non-parametric activation layers

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Elementwise activation applied between linear layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Identity,
}

impl Activation {
    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        match self {
            Activation::Relu => input.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => input.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Identity => input.clone(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Activation::Relu => "ReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Identity => "Identity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_relu_clamps_negatives() {
        let out = Activation::Relu.forward(&array![-1.0, 0.0, 2.5]);
        assert_eq!(out, array![0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let out = Activation::Sigmoid.forward(&array![0.0]);
        assert_abs_diff_eq!(out[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_identity_passthrough() {
        let input = array![1.0, -2.0];
        assert_eq!(Activation::Identity.forward(&input), input);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Activation::Relu).unwrap();
        assert_eq!(json, "\"relu\"");
    }
}
