//! Ordered model container with named layers

use crate::nn::{Activation, Linear};
use crate::quant::QuantLinear;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A named model layer.
///
/// `QuantLinear` only appears after quantization conversion has swapped a
/// `Linear` out.
#[derive(Debug, Clone)]
pub enum Layer {
    Linear(Linear),
    Activation(Activation),
    QuantLinear(QuantLinear),
}

impl Layer {
    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        match self {
            Layer::Linear(layer) => layer.forward(input),
            Layer::Activation(act) => act.forward(input),
            Layer::QuantLinear(layer) => layer.forward(input),
        }
    }

    pub fn num_parameters(&self) -> usize {
        match self {
            Layer::Linear(layer) => layer.num_parameters(),
            Layer::Activation(_) => 0,
            Layer::QuantLinear(layer) => layer.num_parameters(),
        }
    }

    pub fn as_linear(&self) -> Option<&Linear> {
        match self {
            Layer::Linear(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_linear_mut(&mut self) -> Option<&mut Linear> {
        match self {
            Layer::Linear(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_quant_linear(&self) -> Option<&QuantLinear> {
        match self {
            Layer::QuantLinear(layer) => Some(layer),
            _ => None,
        }
    }
}

/// Zero-fraction observation for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSparsity {
    pub layer: String,
    pub sparsity: f32,
    pub zero_count: usize,
    pub num_elements: usize,
}

/// Zero-fraction observations across a model's weight-bearing layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsityReport {
    pub layers: Vec<LayerSparsity>,
    pub overall: f32,
}

/// Ordered composition of named layers.
///
/// Layer names are unique and serve as the target references in sparsity
/// configuration groups.
///
/// # Example
///
/// ```
/// use podar::nn::{Activation, Linear, Sequential};
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let model = Sequential::new()
///     .with_linear("seq.0", Linear::init(16, 16, &mut rng))
///     .with_activation("seq.1", Activation::Relu)
///     .with_linear("linear", Linear::init(16, 16, &mut rng));
///
/// assert_eq!(model.linear_names(), vec!["seq.0", "linear"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    layers: Vec<(String, Layer)>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a linear layer.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already used by another layer.
    pub fn with_linear(mut self, name: impl Into<String>, layer: Linear) -> Self {
        self.push(name.into(), Layer::Linear(layer));
        self
    }

    /// Append an activation layer.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already used by another layer.
    pub fn with_activation(mut self, name: impl Into<String>, act: Activation) -> Self {
        self.push(name.into(), Layer::Activation(act));
        self
    }

    fn push(&mut self, name: String, layer: Layer) {
        assert!(
            !self.layers.iter().any(|(n, _)| *n == name),
            "duplicate layer name: {name}"
        );
        self.layers.push((name, layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[(String, Layer)] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = (&str, &mut Layer)> {
        self.layers.iter_mut().map(|(name, layer)| (name.as_str(), layer))
    }

    /// Names of all linear layers, in model order
    pub fn linear_names(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter(|(_, layer)| matches!(layer, Layer::Linear(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|(n, _)| n == name).map(|(_, l)| l)
    }

    /// Linear layer by name
    pub fn linear(&self, name: &str) -> Option<&Linear> {
        self.layer(name).and_then(Layer::as_linear)
    }

    pub fn linear_mut(&mut self, name: &str) -> Option<&mut Linear> {
        self.layers
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, l)| l.as_linear_mut())
    }

    /// Forward pass through all layers in order.
    ///
    /// An empty model returns the input unchanged.
    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        let mut current = input.clone();
        for (_, layer) in &self.layers {
            current = layer.forward(&current);
        }
        current
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|(_, l)| l.num_parameters()).sum()
    }

    /// True if any linear layer still carries an attached mask
    pub fn has_masks(&self) -> bool {
        self.layers
            .iter()
            .filter_map(|(_, l)| l.as_linear())
            .any(Linear::has_mask)
    }

    /// Observed zero fractions per weight-bearing layer and overall.
    ///
    /// Linear layers report their effective (masked) weights; quantized
    /// layers report zeros in the stored integer weights.
    pub fn sparsity_report(&self) -> SparsityReport {
        let mut layers = Vec::new();
        let mut zeros = 0usize;
        let mut total = 0usize;
        for (name, layer) in &self.layers {
            let entry = match layer {
                Layer::Linear(lin) => LayerSparsity {
                    layer: name.clone(),
                    sparsity: lin.sparsity(),
                    zero_count: lin.zero_count(),
                    num_elements: lin.weight().len(),
                },
                Layer::QuantLinear(qlin) => LayerSparsity {
                    layer: name.clone(),
                    sparsity: qlin.sparsity(),
                    zero_count: qlin.zero_count(),
                    num_elements: qlin.num_weights(),
                },
                Layer::Activation(_) => continue,
            };
            zeros += entry.zero_count;
            total += entry.num_elements;
            layers.push(entry);
        }
        let overall = if total == 0 { 0.0 } else { zeros as f32 / total as f32 };
        SparsityReport { layers, overall }
    }
}
