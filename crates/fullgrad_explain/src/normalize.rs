//! Min-max normalization.

use burn::prelude::*;

/// Scale a tensor to `[0, 1]` by min-max normalization.
///
/// The minimum maps to 0 and the maximum to 1. A constant tensor has no
/// range to divide by and maps to all zeros.
///
/// ```rust,ignore
/// let t = Tensor::<NdArray, 1>::from_floats([2.0, 4.0, 6.0], &device);
/// // [0.0, 0.5, 1.0]
/// let n = normalize(t);
/// ```
pub fn normalize<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    let min_val: f32 = tensor.clone().min().into_scalar().elem();
    let max_val: f32 = tensor.clone().max().into_scalar().elem();
    let range = max_val - min_val;

    let shifted = tensor - min_val;
    if range > 0.0 {
        shifted / range
    } else {
        shifted
    }
}
