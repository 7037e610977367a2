//! Implicit bias of batch-normalization layers.
//!
//! A batch-normalization layer in eval mode computes
//! `weight * (x - running_mean) / sqrt(running_var) + bias`. Expanding the
//! product leaves an additive term `-running_mean / sqrt(running_var) * weight`
//! that behaves like a bias but is not a learnable parameter.

use burn::prelude::*;
use fullgrad_core::{Mode, Step};
use fullgrad_store::TensorStore;
use serde::{Deserialize, Serialize};

use crate::convert::to_tensor;
use crate::error::{ExplainError, Result};

/// Tensor names of one batch-normalization layer's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNormNames {
    /// Layer identifier.
    pub layer: String,
    /// Name of the scale parameter.
    pub weight: String,
    /// Name of the running variance.
    pub running_var: String,
    /// Name of the running mean.
    pub running_mean: String,
}

impl BatchNormNames {
    /// Names following the `<layer>.<param>` convention.
    pub fn for_layer(layer: impl Into<String>) -> Self {
        let layer = layer.into();
        Self {
            weight: format!("{}.weight", layer),
            running_var: format!("{}.running_var", layer),
            running_mean: format!("{}.running_mean", layer),
            layer,
        }
    }
}

/// Reconstruct the implicit bias `-running_mean / sqrt(running_var) * weight`.
///
/// # Errors
///
/// - [`ExplainError::ShapeMismatch`] if the three tensors differ in length.
/// - [`ExplainError::NonPositiveVariance`] if any variance is `<= 0`.
pub fn implicit_bias<B: Backend>(
    layer: &str,
    weight: Tensor<B, 1>,
    running_var: Tensor<B, 1>,
    running_mean: Tensor<B, 1>,
) -> Result<Tensor<B, 1>> {
    let [channels] = weight.dims();
    if running_var.dims() != [channels] || running_mean.dims() != [channels] {
        return Err(ExplainError::ShapeMismatch(format!(
            "layer '{}': weight {:?}, running_var {:?}, running_mean {:?}",
            layer,
            weight.dims(),
            running_var.dims(),
            running_mean.dims()
        )));
    }

    let min_var: f32 = running_var.clone().min().into_scalar().elem();
    if !(min_var > 0.0) {
        return Err(ExplainError::NonPositiveVariance {
            layer: layer.to_string(),
        });
    }

    Ok(running_mean.neg() / running_var.sqrt() * weight)
}

/// Fetch statistics for every layer at `step` and reconstruct their implicit biases.
///
/// The output has the same length and order as `layers`. If any tensor is
/// missing for the step the whole call fails with
/// [`ExplainError::TensorUnavailableForStep`] so the caller can skip the step.
pub fn implicit_biases<B: Backend, S: TensorStore>(
    store: &S,
    layers: &[BatchNormNames],
    step: Step,
    mode: Mode,
    device: &B::Device,
) -> Result<Vec<Tensor<B, 1>>> {
    layers
        .iter()
        .map(|names| {
            let weight = to_tensor(&store.tensor(&names.weight, step, mode)?, device)?;
            let running_var = to_tensor(&store.tensor(&names.running_var, step, mode)?, device)?;
            let running_mean = to_tensor(&store.tensor(&names.running_mean, step, mode)?, device)?;
            implicit_bias(&names.layer, weight, running_var, running_mean)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fullgrad_core::backend::NdArray;
    use fullgrad_store::MemoryStore;
    use ndarray::{ArrayD, IxDyn};

    type TestBackend = NdArray;

    fn floats(values: &[f32]) -> Tensor<TestBackend, 1> {
        Tensor::from_floats(values, &Default::default())
    }

    fn values(t: Tensor<TestBackend, 1>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_implicit_bias_formula() {
        let bias = implicit_bias(
            "bn1",
            floats(&[2.0, 1.0]),
            floats(&[4.0, 0.25]),
            floats(&[1.0, -3.0]),
        )
        .unwrap();

        // -1/2*2 = -1, 3/0.5*1 = 6
        let got = values(bias);
        assert!((got[0] + 1.0).abs() < 1e-6);
        assert!((got[1] - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_implicit_bias_antisymmetric_in_mean() {
        let weight = floats(&[0.5, 1.5, -2.0]);
        let var = floats(&[1.0, 0.3, 2.5]);
        let mean = floats(&[0.7, -1.1, 0.2]);

        let pos = values(implicit_bias("bn", weight.clone(), var.clone(), mean.clone()).unwrap());
        let neg = values(implicit_bias("bn", weight, var, mean.neg()).unwrap());

        for (a, b) in pos.iter().zip(neg.iter()) {
            assert!((a + b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_variance_is_fatal() {
        let err = implicit_bias("bn2", floats(&[1.0, 1.0]), floats(&[1.0, 0.0]), floats(&[0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, ExplainError::NonPositiveVariance { ref layer } if layer == "bn2"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_length_mismatch() {
        let err = implicit_bias("bn", floats(&[1.0, 1.0]), floats(&[1.0]), floats(&[0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch(_)));
    }

    #[test]
    fn test_implicit_biases_keep_order_and_fail_on_missing_step() {
        let device = Default::default();
        let step = Step::new(4);
        let mut store = MemoryStore::new();
        for (layer, mean) in [("bn1", 1.0f32), ("layer1.bn2", -1.0)] {
            let names = BatchNormNames::for_layer(layer);
            store.insert(Mode::Eval, step, names.weight, ArrayD::ones(IxDyn(&[2])));
            store.insert(Mode::Eval, step, names.running_var, ArrayD::ones(IxDyn(&[2])));
            store.insert(Mode::Eval, step, names.running_mean, ArrayD::from_elem(IxDyn(&[2]), mean));
        }

        let layers = vec![BatchNormNames::for_layer("layer1.bn2"), BatchNormNames::for_layer("bn1")];
        let biases = implicit_biases::<TestBackend, _>(&store, &layers, step, Mode::Eval, &device).unwrap();
        assert_eq!(biases.len(), 2);
        assert_eq!(values(biases[0].clone()), vec![1.0, 1.0]);
        assert_eq!(values(biases[1].clone()), vec![-1.0, -1.0]);

        let err = implicit_biases::<TestBackend, _>(&store, &layers, Step::new(5), Mode::Eval, &device)
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
