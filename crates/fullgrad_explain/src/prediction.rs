//! Class prediction from model logits.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

use crate::convert::to_array2;
use crate::error::{ExplainError, Result};

/// The predicted class of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the most probable class.
    pub class_index: usize,
    /// Human-readable class name, when labels are known.
    pub class_name: Option<String>,
    /// Softmax probability of the predicted class.
    pub probability: f32,
}

impl Prediction {
    /// Class name, falling back to the index.
    #[must_use]
    pub fn label(&self) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| format!("class {}", self.class_index))
    }
}

/// Decode the prediction for batch item `item` from `(B, classes)` logits.
///
/// `labels` maps class indices to names; it may be shorter than the number
/// of classes.
pub fn decode_prediction<B: Backend>(
    logits: Tensor<B, 2>,
    item: usize,
    labels: &[String],
) -> Result<Prediction> {
    let [batch, classes] = logits.dims();
    if item >= batch || classes == 0 {
        return Err(ExplainError::ShapeMismatch(format!(
            "cannot decode item {} from logits of shape {:?}",
            item,
            [batch, classes]
        )));
    }

    let probs = to_array2(softmax(logits, 1))?;
    let row = probs.row(item);
    let (class_index, probability) = row
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (idx, p)| if p > best.1 { (idx, p) } else { best });

    Ok(Prediction {
        class_index,
        class_name: labels.get(class_index).cloned(),
        probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fullgrad_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_decode_picks_argmax() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats([0.0, 3.0, 1.0, 5.0, 0.0, -1.0], &device)
            .reshape([2, 3]);
        let labels = vec!["cat".to_string(), "dog".to_string(), "fox".to_string()];

        let first = decode_prediction(logits.clone(), 0, &labels).unwrap();
        assert_eq!(first.class_index, 1);
        assert_eq!(first.label(), "dog");

        let second = decode_prediction(logits, 1, &labels).unwrap();
        assert_eq!(second.class_index, 0);
        assert!(second.probability > 0.9 && second.probability <= 1.0);
    }

    #[test]
    fn test_missing_label_falls_back_to_index() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats([0.0, 2.0], &device).reshape([1, 2]);
        let prediction = decode_prediction(logits, 0, &[]).unwrap();
        assert_eq!(prediction.class_name, None);
        assert_eq!(prediction.label(), "class 1");
    }

    #[test]
    fn test_item_out_of_range() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([1, 4], &device);
        assert!(decode_prediction(logits, 1, &[]).is_err());
    }
}
