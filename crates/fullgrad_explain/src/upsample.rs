//! Order-1 spatial upsampling.
//!
//! Output index `o` samples the input at `o * (in - 1) / (out - 1)`, so the
//! first and last samples of both grids coincide. Resampling one axis is a
//! product with a dense `(out, in)` interpolation matrix, which keeps the
//! whole operation on the tensor backend.

use burn::prelude::*;

/// Build the `(out, in)` linear interpolation matrix for one axis.
///
/// Each row holds at most two non-zero weights that sum to one.
pub fn interpolation_matrix<B: Backend>(
    out_len: usize,
    in_len: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut weights = vec![0.0f32; out_len * in_len];
    let scale = if out_len > 1 && in_len > 1 {
        (in_len - 1) as f32 / (out_len - 1) as f32
    } else {
        0.0
    };

    for o in 0..out_len {
        let pos = o as f32 * scale;
        let lo = (pos.floor() as usize).min(in_len - 1);
        let hi = (lo + 1).min(in_len - 1);
        let frac = pos - lo as f32;

        let row = &mut weights[o * in_len..(o + 1) * in_len];
        row[lo] += 1.0 - frac;
        row[hi] += frac;
    }

    Tensor::from_data(TensorData::new(weights, [out_len, in_len]), device)
}

/// Upsample a `(C, h, w)` tensor to `(C, H, W)` with order-1 interpolation.
///
/// Each channel is resampled independently.
pub fn upsample_linear<B: Backend>(tensor: Tensor<B, 3>, size: [usize; 2]) -> Tensor<B, 3> {
    let [channels, in_h, in_w] = tensor.dims();
    let [out_h, out_w] = size;
    if [in_h, in_w] == size {
        return tensor;
    }

    let device = tensor.device();
    let rows = interpolation_matrix::<B>(out_h, in_h, &device).transpose();
    let cols = interpolation_matrix::<B>(out_w, in_w, &device).transpose();

    // Width first: (C*h, w) x (w, W)
    let x = tensor.reshape([channels * in_h, in_w]).matmul(cols);
    // Bring height last, then (C*W, h) x (h, H)
    let x = x.reshape([channels, in_h, out_w]).swap_dims(1, 2);
    let x = x.reshape([channels * out_w, in_h]).matmul(rows);

    x.reshape([channels, out_w, out_h]).swap_dims(1, 2)
}
