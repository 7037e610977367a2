//! Conversions between store arrays and Burn tensors.

use burn::prelude::*;
use ndarray::{Array2, Array3, ArrayD};

use crate::error::{ExplainError, Result};

/// Convert a dynamic-rank array into a rank-`D` tensor.
///
/// # Errors
///
/// Returns [`ExplainError::ShapeMismatch`] if the array rank is not `D`.
pub fn to_tensor<B: Backend, const D: usize>(
    array: &ArrayD<f32>,
    device: &B::Device,
) -> Result<Tensor<B, D>> {
    if array.ndim() != D {
        return Err(ExplainError::ShapeMismatch(format!(
            "expected rank {}, got shape {:?}",
            D,
            array.shape()
        )));
    }
    // `iter` walks in logical row-major order regardless of memory layout
    let values: Vec<f32> = array.iter().copied().collect();
    let data = TensorData::new(values, array.shape().to_vec());
    Ok(Tensor::from_data(data, device))
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Conversion(format!("{:?}", e)))
}

/// Convert a rank-2 tensor into an ndarray matrix.
pub fn to_array2<B: Backend>(tensor: Tensor<B, 2>) -> Result<Array2<f32>> {
    let [rows, cols] = tensor.dims();
    let values = tensor_values(tensor)?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| ExplainError::Conversion(e.to_string()))
}

/// Convert a rank-3 tensor into an ndarray array.
pub fn to_array3<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array3<f32>> {
    let [d0, d1, d2] = tensor.dims();
    let values = tensor_values(tensor)?;
    Array3::from_shape_vec((d0, d1, d2), values).map_err(|e| ExplainError::Conversion(e.to_string()))
}
