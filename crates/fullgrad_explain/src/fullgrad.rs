//! Full-gradient saliency accumulation.
//!
//! The map is the sum of an input term, `|input_gradient * image|`, and one
//! term per normalization layer, `|(bias + implicit_bias) * output_gradient|`,
//! each min-max normalized and upsampled to the image size before summing.
//!
//! Reference: Srinivas & Fleuret, "Full-Gradient Representation for Neural
//! Network Visualization", NeurIPS 2019.

use burn::prelude::*;
use fullgrad_core::{Mode, Step};
use fullgrad_store::TensorStore;

use crate::error::Result;
use crate::layers::{collect_step, LayerKey, LayerSet, StepInputs, TensorNames};
use crate::normalize::normalize;
use crate::prediction::decode_prediction;
use crate::saliency::SaliencyMap;
use crate::upsample::upsample_linear;

/// Input-gradient term for one image: `normalize(sum_c |gradient * image|)`.
///
/// # Arguments
///
/// * `image` - Input image `(C, H, W)`
/// * `gradient` - Gradient with respect to the image `(C, H, W)`
///
/// # Returns
///
/// Map of shape `(H, W)` in [0, 1].
pub fn input_term<B: Backend>(image: Tensor<B, 3>, gradient: Tensor<B, 3>) -> Tensor<B, 2> {
    let [_, height, width] = image.dims();
    let attribution = (gradient * image).abs().sum_dim(0).reshape([height, width]);
    normalize(attribution)
}

/// Bias-gradient term of one layer for one image, upsampled to `size`.
///
/// # Arguments
///
/// * `gradient` - Layer output gradient `(C, h, w)`
/// * `total_bias` - Explicit plus implicit bias `(C)`
/// * `size` - Target `[H, W]`
///
/// # Returns
///
/// Map of shape `(H, W)`: the per-channel upsampled terms summed over channels.
pub fn layer_term<B: Backend>(
    gradient: Tensor<B, 3>,
    total_bias: Tensor<B, 1>,
    size: [usize; 2],
) -> Tensor<B, 2> {
    let [channels, _, _] = gradient.dims();
    let term = normalize((total_bias.reshape([channels, 1, 1]) * gradient).abs());

    // Interpolation is linear, so channels are summed before upsampling
    upsample_linear(term.sum_dim(0), size).reshape(size)
}

/// Upsampled term of every layer for batch item `item`, in layer key order.
pub fn layer_contributions<B: Backend>(
    layers: &LayerSet<B>,
    item: usize,
    size: [usize; 2],
) -> Result<Vec<(LayerKey, Tensor<B, 2>)>> {
    layers
        .iter()
        .map(|(key, record)| -> Result<(LayerKey, Tensor<B, 2>)> {
            let total_bias = record.total_bias(key)?;
            let gradient = record.gradient.item(item)?;
            tracing::debug!("Layer '{}': gradient {:?} -> {:?}", key, gradient.dims(), size);
            Ok((key.clone(), layer_term(gradient, total_bias, size)))
        })
        .collect()
}

/// Running sums of `base` and each term, in the order given.
///
/// The first element is `base`, the last is the unnormalized map. Values
/// before the final normalization depend on the order of `terms`.
pub fn contribution_trace<B, I>(base: Tensor<B, 2>, terms: I) -> Vec<Tensor<B, 2>>
where
    B: Backend,
    I: IntoIterator<Item = Tensor<B, 2>>,
{
    let partials = terms.into_iter().scan(base.clone(), |acc, term| {
        *acc = acc.clone() + term;
        Some(acc.clone())
    });
    std::iter::once(base).chain(partials).collect()
}

/// Full-gradient saliency map for batch item `item` of a collected step.
///
/// `labels` names the classes of the decoded prediction.
pub fn full_gradient<B: Backend>(
    inputs: &StepInputs<B>,
    item: usize,
    labels: &[String],
) -> Result<SaliencyMap<B>> {
    let size = inputs.image.shape().spatial();
    let base = input_term(inputs.image.item(item)?, inputs.input_gradient.item(item)?);

    let map = layer_contributions(&inputs.layers, item, size)?
        .into_iter()
        .fold(base, |acc, (_, term)| acc + term);

    let saliency = SaliencyMap::new(map, inputs.step, item).normalize();
    match &inputs.logits {
        Some(logits) => Ok(saliency.with_prediction(decode_prediction(logits.clone(), item, labels)?)),
        None => Ok(saliency),
    }
}

/// Collect `step` from `store` and build the saliency map of batch item `item`.
pub fn build_saliency_map<B: Backend, S: TensorStore>(
    store: &S,
    names: &TensorNames,
    step: Step,
    mode: Mode,
    item: usize,
    device: &B::Device,
) -> Result<SaliencyMap<B>> {
    let inputs = collect_step(store, names, step, mode, device)?;
    full_gradient(&inputs, item, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::to_array2;
    use fullgrad_core::backend::NdArray;
    use fullgrad_core::Seed;
    use fullgrad_store::{synthetic_store, SyntheticLayer, SyntheticSpec};

    type TestBackend = NdArray;

    fn range(t: &Tensor<TestBackend, 2>) -> (f32, f32) {
        let min: f32 = t.clone().min().into_scalar().elem();
        let max: f32 = t.clone().max().into_scalar().elem();
        (min, max)
    }

    #[test]
    fn test_input_term_sums_channels() {
        let device = Default::default();
        let image = Tensor::<TestBackend, 3>::ones([3, 2, 2], &device);
        let data: Vec<f32> = (0..12).map(|i| if i % 4 == 3 { -2.0 } else { 1.0 }).collect();
        let gradient = Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device).reshape([3, 2, 2]);

        let term = to_array2(input_term(image, gradient)).unwrap();
        // Pixel (1, 1) has |-2| in every channel, the rest |1|
        assert_eq!(term[[1, 1]], 1.0);
        assert_eq!(term[[0, 0]], 0.0);
    }

    #[test]
    fn test_zero_input_gradient_is_guarded() {
        let device = Default::default();
        let image = Tensor::<TestBackend, 3>::ones([3, 4, 4], &device);
        let gradient = Tensor::<TestBackend, 3>::zeros([3, 4, 4], &device);

        let term = input_term(image, gradient);
        assert_eq!(range(&term), (0.0, 0.0));
    }

    #[test]
    fn test_layer_term_shape_and_bounds() {
        let device = Default::default();
        let data: Vec<f32> = (0..2 * 3 * 3).map(|i| (i as f32 - 7.0) * 0.1).collect();
        let gradient = Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device).reshape([2, 3, 3]);
        let bias = Tensor::<TestBackend, 1>::from_floats([0.5, -2.0], &device);

        let term = layer_term(gradient, bias, [12, 9]);
        assert_eq!(term.dims(), [12, 9]);
        let (min, max) = range(&term);
        // Each channel lies in [0, 1] before summing two channels
        assert!(min >= 0.0 && max <= 2.0 + 1e-5);
    }

    #[test]
    fn test_trace_depends_on_order_but_final_bound_does_not() {
        let device = Default::default();
        let ramp: Vec<f32> = (0..16).map(|i| i as f32 / 15.0).collect();
        let base = Tensor::<TestBackend, 1>::from_floats(ramp.as_slice(), &device).reshape([4, 4]);
        let a = Tensor::<TestBackend, 2>::ones([4, 4], &device) * 3.0;
        let b = base.clone().neg() + 1.0;

        let forward = contribution_trace(base.clone(), vec![a.clone(), b.clone()]);
        let reverse = contribution_trace(base, vec![b, a]);
        assert_eq!(forward.len(), 3);

        let (f_min, _) = range(&forward[1]);
        let (r_min, _) = range(&reverse[1]);
        assert!((f_min - r_min).abs() > 1e-3);

        for trace in [forward, reverse] {
            let last = trace.last().unwrap().clone();
            let (min, max) = range(&normalize(last));
            assert!(min >= 0.0 && max <= 1.0);
        }
    }

    #[test]
    fn test_full_gradient_in_unit_range() {
        let spec = SyntheticSpec {
            batch: 2,
            image_size: 24,
            layers: vec![
                SyntheticLayer::new("bn1", 4, 12),
                SyntheticLayer::new("layer1.bn1", 6, 6),
            ],
            n_classes: 5,
            n_steps: 1,
            ..Default::default()
        };
        let store = synthetic_store(&spec, Seed::new(11));
        let device = Default::default();
        let inputs = collect_step::<TestBackend, _>(
            &store,
            &TensorNames::default(),
            Step::new(1),
            Mode::Eval,
            &device,
        )
        .unwrap();

        for item in 0..2 {
            let map = full_gradient(&inputs, item, &[]).unwrap();
            assert_eq!(map.shape(), [24, 24]);
            assert_eq!(map.item, item);
            let (min, max) = map.range();
            assert!(min.abs() < 1e-6);
            assert!((max - 1.0).abs() < 1e-5);
            assert!(map.prediction.is_some());
        }
        assert!(full_gradient(&inputs, 2, &[]).is_err());
    }

    #[test]
    fn test_build_saliency_map_skips_unavailable_step() {
        let store = synthetic_store(&SyntheticSpec::small(8), Seed::new(5));
        let device = Default::default();
        let err = build_saliency_map::<TestBackend, _>(
            &store,
            &TensorNames::default(),
            Step::new(99),
            Mode::Eval,
            0,
            &device,
        )
        .unwrap_err();
        assert!(err.is_unavailable());
    }
}
