//! Keyed collection of per-layer tensors.
//!
//! Tensors are joined by layer identifier extracted from their names, so a
//! gradient can never be paired with another layer's statistics. A layer
//! whose gradient is recorded but whose parameters are not is reported as
//! an error instead of being dropped or shifted.

use std::collections::BTreeMap;
use std::fmt;

use burn::prelude::*;
use fullgrad_core::{ImageTensor, Mode, Step};
use fullgrad_store::{TensorQuery, TensorStore};
use serde::{Deserialize, Serialize};

use crate::convert::to_tensor;
use crate::error::{ExplainError, Result};
use crate::implicit_bias::implicit_bias;

/// Tensor naming scheme of a recording.
///
/// Layer patterns are regular expressions with a named `layer` group; the
/// captured text is the join key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorNames {
    /// Model input image `(B, 3, H, W)`.
    pub input: String,
    /// Gradient of the loss with respect to the input image.
    pub input_gradient: String,
    /// Output gradients of normalization layers `(B, C, h, w)`.
    ///
    /// Every layer this matches must have all four parameters recorded.
    pub layer_gradient: String,
    /// Explicit bias `(C)`.
    pub bias: String,
    /// Scale parameter `(C)`.
    pub weight: String,
    /// Running mean `(C)`.
    pub running_mean: String,
    /// Running variance `(C)`.
    pub running_var: String,
    /// Model logits `(B, classes)`, if recorded.
    pub logits: Option<String>,
}

impl Default for TensorNames {
    fn default() -> Self {
        Self {
            input: "input_image".to_string(),
            input_gradient: "gradient/input_image".to_string(),
            // Normalization layers only; other output gradients have no running statistics
            layer_gradient: r"^gradient/(?P<layer>.*(?:bn|norm)\d*)_output$".to_string(),
            bias: r"^(?P<layer>.+)\.bias$".to_string(),
            weight: r"^(?P<layer>.+)\.weight$".to_string(),
            running_mean: r"^(?P<layer>.+)\.running_mean$".to_string(),
            running_var: r"^(?P<layer>.+)\.running_var$".to_string(),
            logits: Some("output".to_string()),
        }
    }
}

/// Identifier of a normalization layer, e.g. `layer1.0.bn1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(String);

impl LayerKey {
    /// Create a key.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The layer identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All recorded tensors of one normalization layer at one step.
#[derive(Debug, Clone)]
pub struct LayerRecord<B: Backend> {
    /// Layer output gradient `(B, C, h, w)`.
    pub gradient: ImageTensor<B>,
    /// Explicit bias `(C)`.
    pub bias: Tensor<B, 1>,
    /// Scale parameter `(C)`.
    pub weight: Tensor<B, 1>,
    /// Running mean `(C)`.
    pub running_mean: Tensor<B, 1>,
    /// Running variance `(C)`.
    pub running_var: Tensor<B, 1>,
}

impl<B: Backend> LayerRecord<B> {
    /// Create a record, checking that every parameter has one value per gradient channel.
    pub fn new(
        key: &LayerKey,
        gradient: ImageTensor<B>,
        bias: Tensor<B, 1>,
        weight: Tensor<B, 1>,
        running_mean: Tensor<B, 1>,
        running_var: Tensor<B, 1>,
    ) -> Result<Self> {
        let channels = gradient.channels();
        for (kind, param) in [
            ("bias", &bias),
            ("weight", &weight),
            ("running_mean", &running_mean),
            ("running_var", &running_var),
        ] {
            let [len] = param.dims();
            if len != channels {
                return Err(ExplainError::ShapeMismatch(format!(
                    "layer '{}': {} has {} values for {} gradient channels",
                    key, kind, len, channels
                )));
            }
        }

        Ok(Self {
            gradient,
            bias,
            weight,
            running_mean,
            running_var,
        })
    }

    /// Implicit bias reconstructed from the running statistics.
    ///
    /// Same result as [`implicit_biases`](crate::implicit_biases) for this
    /// layer, without a second round of store reads.
    pub fn implicit_bias(&self, key: &LayerKey) -> Result<Tensor<B, 1>> {
        implicit_bias(
            key.as_str(),
            self.weight.clone(),
            self.running_var.clone(),
            self.running_mean.clone(),
        )
    }

    /// Explicit plus implicit bias.
    pub fn total_bias(&self, key: &LayerKey) -> Result<Tensor<B, 1>> {
        Ok(self.bias.clone() + self.implicit_bias(key)?)
    }
}

/// Layer records keyed by layer identifier, iterated in key order.
#[derive(Debug, Clone)]
pub struct LayerSet<B: Backend> {
    layers: BTreeMap<LayerKey, LayerRecord<B>>,
}

impl<B: Backend> LayerSet<B> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }

    /// Insert a record, returning the previous record for the key.
    pub fn insert(&mut self, key: LayerKey, record: LayerRecord<B>) -> Option<LayerRecord<B>> {
        self.layers.insert(key, record)
    }

    /// Look up a layer.
    pub fn get(&self, key: &LayerKey) -> Option<&LayerRecord<B>> {
        self.layers.get(key)
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LayerKey, &LayerRecord<B>)> {
        self.layers.iter()
    }

    /// Layer keys in iteration order.
    pub fn keys(&self) -> Vec<&LayerKey> {
        self.layers.keys().collect()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the set holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<B: Backend> Default for LayerSet<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the full-gradient map needs for one step.
#[derive(Debug, Clone)]
pub struct StepInputs<B: Backend> {
    /// Step the tensors were recorded at.
    pub step: Step,
    /// Input image batch `(B, 3, H, W)`.
    pub image: ImageTensor<B>,
    /// Gradient with respect to the input image.
    pub input_gradient: ImageTensor<B>,
    /// Normalization layers.
    pub layers: LayerSet<B>,
    /// Model logits `(B, classes)`, when recorded.
    pub logits: Option<Tensor<B, 2>>,
}

impl<B: Backend> StepInputs<B> {
    /// Number of images in the batch.
    #[must_use]
    pub fn batch(&self) -> usize {
        self.image.batch()
    }
}

/// Map each layer matched by `pattern` to its tensor name.
fn names_by_layer(names: &[String], pattern: &str) -> Result<BTreeMap<LayerKey, String>> {
    let query = TensorQuery::new(pattern)?;
    Ok(names
        .iter()
        .filter_map(|name| query.layer_of(name).map(|layer| (LayerKey::new(layer), name.clone())))
        .collect())
}

fn image_tensor<B: Backend, S: TensorStore>(
    store: &S,
    name: &str,
    step: Step,
    mode: Mode,
    device: &B::Device,
) -> Result<ImageTensor<B>> {
    let tensor = to_tensor::<B, 4>(&store.tensor(name, step, mode)?, device)?;
    Ok(ImageTensor::new(tensor)?)
}

/// Fetch every tensor of `step` and join layer tensors by layer identifier.
///
/// The statistics are read once into each [`LayerRecord`]; use
/// [`implicit_biases`](crate::implicit_biases) instead when only the implicit
/// biases of an explicit list of layers are needed.
///
/// # Errors
///
/// - [`ExplainError::TensorUnavailableForStep`] if any needed tensor is not
///   recorded for the step yet; the caller should skip the step.
/// - [`ExplainError::MissingLayerTensor`] if a layer has a gradient but one
///   of its parameters is absent from the store altogether.
pub fn collect_step<B: Backend, S: TensorStore>(
    store: &S,
    names: &TensorNames,
    step: Step,
    mode: Mode,
    device: &B::Device,
) -> Result<StepInputs<B>> {
    let image = image_tensor(store, &names.input, step, mode, device)?;
    let input_gradient = image_tensor(store, &names.input_gradient, step, mode, device)?;
    image.ensure_same_shape(&input_gradient)?;

    let all_names = store.tensor_names()?;
    let gradients = names_by_layer(&all_names, &names.layer_gradient)?;
    let biases = names_by_layer(&all_names, &names.bias)?;
    let weights = names_by_layer(&all_names, &names.weight)?;
    let means = names_by_layer(&all_names, &names.running_mean)?;
    let vars = names_by_layer(&all_names, &names.running_var)?;

    let param = |key: &LayerKey,
                 kind: &'static str,
                 by_layer: &BTreeMap<LayerKey, String>|
     -> Result<Tensor<B, 1>> {
        let name = by_layer.get(key).ok_or_else(|| ExplainError::MissingLayerTensor {
            layer: key.to_string(),
            kind,
        })?;
        to_tensor::<B, 1>(&store.tensor(name, step, mode)?, device)
    };

    let mut layers = LayerSet::new();
    for (key, gradient_name) in gradients {
        let bias = param(&key, "bias", &biases)?;
        let weight = param(&key, "weight", &weights)?;
        let running_mean = param(&key, "running_mean", &means)?;
        let running_var = param(&key, "running_var", &vars)?;

        let gradient = image_tensor(store, &gradient_name, step, mode, device)?;
        if gradient.batch() != image.batch() {
            return Err(ExplainError::ShapeMismatch(format!(
                "layer '{}' gradient batch {} != image batch {}",
                key,
                gradient.batch(),
                image.batch()
            )));
        }

        let record = LayerRecord::new(&key, gradient, bias, weight, running_mean, running_var)?;
        tracing::debug!("Step {}: collected layer '{}'", step, key);
        layers.insert(key, record);
    }

    let logits = match &names.logits {
        Some(name) => Some(to_tensor::<B, 2>(&store.tensor(name, step, mode)?, device)?),
        None => None,
    };

    Ok(StepInputs {
        step,
        image,
        input_gradient,
        layers,
        logits,
    })
}
