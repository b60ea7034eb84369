//! Model loading functionality

use crate::nn::Sequential;
use crate::sparsity::SparsityMask;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::path::Path;

fn f32_data(view: &TensorView<'_>, name: &str) -> Result<Vec<f32>> {
    if view.dtype() != Dtype::F32 {
        return Err(Error::TensorFormat(format!(
            "tensor '{name}' has dtype {:?}, expected F32",
            view.dtype()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(view.data()))
}

fn load_array2(tensors: &SafeTensors<'_>, name: &str, rows: usize, cols: usize) -> Result<Array2<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| Error::TensorFormat(format!("missing tensor '{name}': {e}")))?;
    let shape = view.shape();
    if shape.len() != 2 || shape[0] != rows || shape[1] != cols {
        return Err(Error::TensorFormat(format!(
            "tensor '{name}' has shape {shape:?}, expected [{rows}, {cols}]"
        )));
    }
    let data = f32_data(&view, name)?;
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::TensorFormat(format!("tensor '{name}': {e}")))
}

fn load_array1(tensors: &SafeTensors<'_>, name: &str, len: usize) -> Result<Array1<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| Error::TensorFormat(format!("missing tensor '{name}': {e}")))?;
    let shape = view.shape();
    if shape.len() != 1 || shape[0] != len {
        return Err(Error::TensorFormat(format!(
            "tensor '{name}' has shape {shape:?}, expected [{len}]"
        )));
    }
    let data = f32_data(&view, name)?;
    Ok(Array1::from_vec(data))
}

/// Load dense model state into an existing model.
///
/// The model supplies the structure; the file supplies the values. Every
/// linear layer must find its `<name>.weight` and `<name>.bias` tensors
/// with matching shapes. A `<name>.mask` tensor is reattached when
/// present; without one any mask on the layer is dropped, so the loaded
/// state mirrors the file exactly. Tensors in the file with no matching
/// layer are ignored.
///
/// # Example
///
/// ```no_run
/// use ndarray::{Array1, Array2};
/// use podar::io::load_model;
/// use podar::nn::{Linear, Sequential};
///
/// let mut model = Sequential::new()
///     .with_linear("fc", Linear::new(Array2::zeros((4, 4)), Array1::zeros(4)));
/// load_model("model.safetensors", &mut model).unwrap();
/// ```
///
/// # Errors
///
/// Returns `Error::TensorFormat` when a required tensor is missing or its
/// shape or dtype does not match the model.
pub fn load_model(path: impl AsRef<Path>, model: &mut Sequential) -> Result<()> {
    let data = std::fs::read(path.as_ref())?;
    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| Error::TensorFormat(format!("SafeTensors deserialization failed: {e}")))?;

    for name in model.linear_names() {
        let linear = match model.linear_mut(&name) {
            Some(linear) => linear,
            None => continue,
        };
        let (rows, cols) = (linear.out_features(), linear.in_features());

        let weight = load_array2(&tensors, &format!("{name}.weight"), rows, cols)?;
        let bias = load_array1(&tensors, &format!("{name}.bias"), rows)?;
        *linear.weight_mut() = weight;
        *linear.bias_mut() = bias;

        match tensors.tensor(&format!("{name}.mask")) {
            Ok(_) => {
                let mask_data = load_array2(&tensors, &format!("{name}.mask"), rows, cols)?;
                linear.attach_mask(SparsityMask::from_array(&mask_data))?;
            }
            Err(_) => {
                linear.detach_mask();
            }
        }
    }

    Ok(())
}
