//! Model saving functionality

use crate::nn::{Layer, Sequential};
use crate::quant::WeightScheme;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::path::Path;

/// Marker stored in file metadata so loaders can tell the two layouts
/// apart.
pub const FORMAT_DENSE: &str = "dense";
pub const FORMAT_INT8: &str = "int8";

type NamedTensor = (String, Dtype, Vec<u8>, Vec<usize>);

fn f32_tensor(name: String, data: Vec<f32>, shape: Vec<usize>) -> NamedTensor {
    let bytes: Vec<u8> = bytemuck::cast_slice(&data).to_vec();
    (name, Dtype::F32, bytes, shape)
}

fn i8_tensor(name: String, data: Vec<i8>, shape: Vec<usize>) -> NamedTensor {
    let bytes: Vec<u8> = bytemuck::cast_slice(&data).to_vec();
    (name, Dtype::I8, bytes, shape)
}

fn i32_tensor(name: String, data: Vec<i32>, shape: Vec<usize>) -> NamedTensor {
    let bytes: Vec<u8> = bytemuck::cast_slice(&data).to_vec();
    (name, Dtype::I32, bytes, shape)
}

fn write_safetensors(
    mut tensor_data: Vec<NamedTensor>,
    metadata: HashMap<String, String>,
    path: &Path,
) -> Result<()> {
    // Sort names for deterministic output
    tensor_data.sort_by(|a, b| a.0.cmp(&b.0));

    let mut views: Vec<(&str, TensorView<'_>)> = Vec::with_capacity(tensor_data.len());
    for (name, dtype, bytes, shape) in &tensor_data {
        let view = TensorView::new(*dtype, shape.clone(), bytes)
            .map_err(|e| Error::TensorFormat(format!("tensor '{name}': {e}")))?;
        views.push((name.as_str(), view));
    }

    let bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Save a dense model as SafeTensors.
///
/// Each linear layer contributes `<name>.weight` and `<name>.bias`, plus
/// `<name>.mask` while a sparsity mask is still attached. Activation
/// layers carry no state and are skipped.
///
/// # Example
///
/// ```no_run
/// use ndarray::{Array1, Array2};
/// use podar::io::save_model;
/// use podar::nn::{Linear, Sequential};
///
/// let model = Sequential::new()
///     .with_linear("fc", Linear::new(Array2::ones((4, 4)), Array1::zeros(4)));
/// save_model(&model, "model.safetensors").unwrap();
/// ```
///
/// # Errors
///
/// Returns `Error::Serialization` when the model contains quantized
/// layers; those belong in [`save_quantized`].
pub fn save_model(model: &Sequential, path: impl AsRef<Path>) -> Result<()> {
    let mut tensor_data: Vec<NamedTensor> = Vec::new();

    for (name, layer) in model.layers() {
        match layer {
            Layer::Linear(linear) => {
                let (rows, cols) = (linear.out_features(), linear.in_features());
                tensor_data.push(f32_tensor(
                    format!("{name}.weight"),
                    linear.weight().iter().copied().collect(),
                    vec![rows, cols],
                ));
                tensor_data.push(f32_tensor(
                    format!("{name}.bias"),
                    linear.bias().to_vec(),
                    vec![rows],
                ));
                if let Some(mask) = linear.mask() {
                    tensor_data.push(f32_tensor(
                        format!("{name}.mask"),
                        mask.as_array().iter().copied().collect(),
                        vec![rows, cols],
                    ));
                }
            }
            Layer::Activation(_) => {}
            Layer::QuantLinear(_) => {
                return Err(Error::Serialization(format!(
                    "layer '{name}' is quantized; use save_quantized"
                )));
            }
        }
    }

    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), FORMAT_DENSE.to_string());

    write_safetensors(tensor_data, metadata, path.as_ref())
}

/// Save a converted model as SafeTensors with 8-bit weights.
///
/// Each quantized layer contributes `<name>.qweight` (I8),
/// `<name>.scale` and `<name>.zero_point` (one entry per tensor or per
/// output row, by scheme), and `<name>.bias` (F32). The file metadata
/// records each layer's scheme, kernel, and activation parameters.
///
/// # Errors
///
/// Returns `Error::Serialization` when the model still contains dense
/// linear layers; run conversion first.
pub fn save_quantized(model: &Sequential, path: impl AsRef<Path>) -> Result<()> {
    let mut tensor_data: Vec<NamedTensor> = Vec::new();
    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), FORMAT_INT8.to_string());

    for (name, layer) in model.layers() {
        match layer {
            Layer::QuantLinear(qlin) => {
                let (rows, cols) = (qlin.out_features(), qlin.in_features());
                tensor_data.push(i8_tensor(
                    format!("{name}.qweight"),
                    qlin.qweight().iter().copied().collect(),
                    vec![rows, cols],
                ));

                let (scales, zero_points): (Vec<f32>, Vec<i32>) = match qlin.scheme() {
                    WeightScheme::PerTensor(params) => {
                        (vec![params.scale], vec![params.zero_point])
                    }
                    WeightScheme::PerChannel(rows) => (
                        rows.iter().map(|p| p.scale).collect(),
                        rows.iter().map(|p| p.zero_point).collect(),
                    ),
                };
                let n = scales.len();
                tensor_data.push(f32_tensor(format!("{name}.scale"), scales, vec![n]));
                tensor_data.push(i32_tensor(format!("{name}.zero_point"), zero_points, vec![n]));
                tensor_data.push(f32_tensor(
                    format!("{name}.bias"),
                    qlin.bias().to_vec(),
                    vec![rows],
                ));

                metadata.insert(
                    format!("{name}.scheme"),
                    qlin.scheme().display_name().to_string(),
                );
                metadata.insert(
                    format!("{name}.kernel"),
                    qlin.kernel().display_name().to_string(),
                );
                metadata.insert(
                    format!("{name}.activation_scale"),
                    format!("{:.8e}", qlin.activation().scale),
                );
                metadata.insert(
                    format!("{name}.activation_zero_point"),
                    qlin.activation().zero_point.to_string(),
                );
            }
            Layer::Activation(_) => {}
            Layer::Linear(_) => {
                return Err(Error::Serialization(format!(
                    "layer '{name}' is not quantized; run convert first"
                )));
            }
        }
    }

    write_safetensors(tensor_data, metadata, path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Activation, Linear};
    use crate::quant::{calibrate, convert, KernelTable, QuantConfig};
    use crate::sparsity::SparsityMask;
    use ndarray::{array, Array1, Array2};
    use tempfile::TempDir;

    fn small_model() -> Sequential {
        Sequential::new()
            .with_linear(
                "fc1",
                Linear::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.1, 0.2]),
            )
            .with_activation("relu", Activation::Relu)
            .with_linear("fc2", Linear::new(array![[0.5, -0.5]], array![0.0]))
    }

    #[test]
    fn test_save_model_writes_all_tensors() {
        let model = small_model();
        let dir = TempDir::new().expect("temp dir creation should succeed");
        let path = dir.path().join("model.safetensors");
        save_model(&model, &path).expect("save should succeed");

        let data = std::fs::read(&path).expect("file read should succeed");
        let loaded = safetensors::SafeTensors::deserialize(&data).expect("valid file");
        let mut names = loaded.names();
        names.sort_unstable();
        assert_eq!(names, vec!["fc1.bias", "fc1.weight", "fc2.bias", "fc2.weight"]);
    }

    #[test]
    fn test_save_model_includes_attached_mask() {
        let mut model = small_model();
        let mask = SparsityMask::from_fn(2, 2, |r, _| r == 0);
        model
            .linear_mut("fc1")
            .expect("fc1 exists")
            .attach_mask(mask)
            .expect("shapes match");

        let dir = TempDir::new().expect("temp dir creation should succeed");
        let path = dir.path().join("masked.safetensors");
        save_model(&model, &path).expect("save should succeed");

        let data = std::fs::read(&path).expect("file read should succeed");
        let loaded = safetensors::SafeTensors::deserialize(&data).expect("valid file");
        assert!(loaded.tensor("fc1.mask").is_ok());
        assert!(loaded.tensor("fc2.mask").is_err());
    }

    #[test]
    fn test_save_model_metadata_format() {
        let model = small_model();
        let dir = TempDir::new().expect("temp dir creation should succeed");
        let path = dir.path().join("model.safetensors");
        save_model(&model, &path).expect("save should succeed");

        let data = std::fs::read(&path).expect("file read should succeed");
        let (_, meta) =
            safetensors::SafeTensors::read_metadata(&data).expect("metadata should parse");
        let metadata = meta.metadata().as_ref().expect("metadata present");
        assert_eq!(metadata.get("format").map(String::as_str), Some(FORMAT_DENSE));
    }

    #[test]
    fn test_save_model_rejects_quantized_layers() {
        let model = small_model();
        let config = QuantConfig::new();
        let calibration = calibrate(&model, &[array![1.0, 1.0]], &config).unwrap();
        let converted = convert(model, &calibration, &config, &KernelTable::new()).unwrap();

        let dir = TempDir::new().expect("temp dir creation should succeed");
        let result = save_model(&converted, dir.path().join("bad.safetensors"));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_quantized_layout_and_metadata() {
        let model = small_model();
        let config = QuantConfig::new();
        let calibration = calibrate(&model, &[array![1.0, -1.0]], &config).unwrap();
        let converted = convert(model, &calibration, &config, &KernelTable::new()).unwrap();

        let dir = TempDir::new().expect("temp dir creation should succeed");
        let path = dir.path().join("model_int8.safetensors");
        save_quantized(&converted, &path).expect("save should succeed");

        let data = std::fs::read(&path).expect("file read should succeed");
        let loaded = safetensors::SafeTensors::deserialize(&data).expect("valid file");
        let qweight = loaded.tensor("fc1.qweight").expect("qweight saved");
        assert_eq!(qweight.dtype(), Dtype::I8);
        assert_eq!(qweight.shape(), &[2, 2]);
        assert!(loaded.tensor("fc1.scale").is_ok());
        assert!(loaded.tensor("fc1.zero_point").is_ok());
        assert!(loaded.tensor("fc1.bias").is_ok());

        let (_, meta) =
            safetensors::SafeTensors::read_metadata(&data).expect("metadata should parse");
        let metadata = meta.metadata().as_ref().expect("metadata present");
        assert_eq!(metadata.get("format").map(String::as_str), Some(FORMAT_INT8));
        assert_eq!(
            metadata.get("fc1.scheme").map(String::as_str),
            Some("per_tensor")
        );
        assert!(metadata.contains_key("fc1.kernel"));
        assert!(metadata.contains_key("fc1.activation_scale"));
    }

    #[test]
    fn test_save_quantized_rejects_dense_layers() {
        let model = small_model();
        let dir = TempDir::new().expect("temp dir creation should succeed");
        let result = save_quantized(&model, dir.path().join("bad.safetensors"));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_model_invalid_path() {
        let model = small_model();
        let result = save_model(&model, "/nonexistent/directory/model.safetensors");
        assert!(result.is_err());
    }

    #[test]
    fn test_quantized_file_is_smaller() {
        // 64x64 weights: roughly 16 KiB dense vs 4 KiB quantized
        let weight = Array2::from_shape_fn((64, 64), |(r, c)| ((r * 64 + c) as f32).sin());
        let model = Sequential::new().with_linear("fc", Linear::new(weight, Array1::zeros(64)));

        let dir = TempDir::new().expect("temp dir creation should succeed");
        let dense_path = dir.path().join("dense.safetensors");
        save_model(&model, &dense_path).expect("save should succeed");

        let config = QuantConfig::new();
        let calibration = calibrate(&model, &[Array1::ones(64)], &config).unwrap();
        let converted = convert(model, &calibration, &config, &KernelTable::new()).unwrap();
        let quant_path = dir.path().join("int8.safetensors");
        save_quantized(&converted, &quant_path).expect("save should succeed");

        let dense_size = std::fs::metadata(&dense_path).unwrap().len();
        let quant_size = std::fs::metadata(&quant_path).unwrap().len();
        assert!(
            quant_size < dense_size / 2,
            "quantized {quant_size} should be well under dense {dense_size}"
        );
    }
}
