//! Saliency map container.

use burn::prelude::*;
use fullgrad_core::Step;
use ndarray::Array2;

use crate::convert::to_array2;
use crate::error::Result;
use crate::normalize::normalize;
use crate::prediction::Prediction;

/// A saliency heatmap over the input image, one per (step, batch item).
#[derive(Debug, Clone)]
pub struct SaliencyMap<B: Backend> {
    /// The saliency values `(H, W)`.
    pub values: Tensor<B, 2>,
    /// Step the inputs were recorded at.
    pub step: Step,
    /// Batch item the map explains.
    pub item: usize,
    /// Model prediction for the item, when logits were recorded.
    pub prediction: Option<Prediction>,
}

impl<B: Backend> SaliencyMap<B> {
    /// Create a new saliency map.
    pub fn new(values: Tensor<B, 2>, step: Step, item: usize) -> Self {
        Self {
            values,
            step,
            item,
            prediction: None,
        }
    }

    /// Set the prediction.
    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.prediction = Some(prediction);
        self
    }

    /// Get the shape `[H, W]`.
    pub fn shape(&self) -> [usize; 2] {
        self.values.dims()
    }

    /// Normalize the values to [0, 1].
    pub fn normalize(self) -> Self {
        Self {
            values: normalize(self.values),
            ..self
        }
    }

    /// Smallest and largest value.
    pub fn range(&self) -> (f32, f32) {
        let min: f32 = self.values.clone().min().into_scalar().elem();
        let max: f32 = self.values.clone().max().into_scalar().elem();
        (min, max)
    }

    /// Copy the values into an ndarray matrix.
    pub fn to_array(&self) -> Result<Array2<f32>> {
        to_array2(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fullgrad_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_saliency_map_shape_and_range() {
        let device = Default::default();
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 2.0).collect();
        let values = Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device).reshape([3, 4]);
        let map = SaliencyMap::new(values, Step::new(1), 0);

        assert_eq!(map.shape(), [3, 4]);
        assert_eq!(map.range(), (0.0, 22.0));

        let normalized = map.normalize();
        let (min, max) = normalized.range();
        assert!(min.abs() < 1e-6 && (max - 1.0).abs() < 1e-6);
        assert!(normalized.prediction.is_none());
    }

    #[test]
    fn test_saliency_map_to_array() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 2>::ones([2, 5], &device);
        let map = SaliencyMap::new(values, Step::new(9), 3).with_prediction(Prediction {
            class_index: 2,
            class_name: None,
            probability: 0.5,
        });

        let array = map.to_array().unwrap();
        assert_eq!(array.dim(), (2, 5));
        assert_eq!(map.item, 3);
        assert_eq!(map.prediction.unwrap().class_index, 2);
    }
}
