//! Deterministic synthetic recordings.
//!
//! Produces a store with the same tensor names a ResNet-style evaluation run
//! records: the input image and its gradient, the output gradient of every
//! batch-normalization layer with that layer's parameters and running
//! statistics, and the model logits.

use fullgrad_core::{Mode, Seed, Step};
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::memory::MemoryStore;

/// A batch-normalization layer in a synthetic recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticLayer {
    /// Layer name, e.g. `layer1.0.bn1`.
    pub name: String,
    /// Number of channels.
    pub channels: usize,
    /// Spatial size of the layer output (square).
    pub size: usize,
}

impl SyntheticLayer {
    /// Create a layer description.
    pub fn new(name: impl Into<String>, channels: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            channels,
            size,
        }
    }
}

/// Shape of a synthetic recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticSpec {
    /// Images per step.
    pub batch: usize,
    /// Image height and width.
    pub image_size: usize,
    /// Recorded normalization layers.
    pub layers: Vec<SyntheticLayer>,
    /// Number of output classes.
    pub n_classes: usize,
    /// Number of steps, numbered from 1.
    pub n_steps: u64,
    /// Mode the steps are recorded under.
    pub mode: Mode,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            batch: 1,
            image_size: 224,
            layers: vec![
                SyntheticLayer::new("bn1", 64, 112),
                SyntheticLayer::new("layer1.0.bn1", 64, 56),
                SyntheticLayer::new("layer2.0.bn1", 128, 28),
                SyntheticLayer::new("layer4.1.bn2", 512, 7),
            ],
            n_classes: 10,
            n_steps: 3,
            mode: Mode::Eval,
        }
    }
}

impl SyntheticSpec {
    /// A recording with a single small layer, handy for tests.
    #[must_use]
    pub fn small(image_size: usize) -> Self {
        let size = (image_size / 4).max(1);
        Self {
            image_size,
            layers: vec![SyntheticLayer::new("bn1", 4, size)],
            n_classes: 3,
            n_steps: 1,
            ..Default::default()
        }
    }
}

/// Generate a complete synthetic recording.
///
/// Every tensor is drawn from a stream derived from `seed`, the tensor name
/// and the step, so the output does not depend on generation order.
pub fn synthetic_store(spec: &SyntheticSpec, seed: Seed) -> MemoryStore {
    let mut store = MemoryStore::new();
    let image_shape = [spec.batch, 3, spec.image_size, spec.image_size];

    for value in 1..=spec.n_steps {
        let step = Step::new(value);
        let draw = |name: &str, shape: &[usize], low: f32, high: f32| {
            uniform(seed.stream(name, step), shape, low, high)
        };

        store.insert(spec.mode, step, "input_image", draw("input_image", &image_shape, -2.0, 2.0));
        store.insert(
            spec.mode,
            step,
            "gradient/input_image",
            draw("gradient/input_image", &image_shape, -1e-3, 1e-3),
        );

        for layer in &spec.layers {
            let grad_name = format!("gradient/{}_output", layer.name);
            let grad_shape = [spec.batch, layer.channels, layer.size, layer.size];
            store.insert(spec.mode, step, grad_name.clone(), draw(&grad_name, &grad_shape, -1e-2, 1e-2));

            for (param, low, high) in [
                ("bias", -0.5, 0.5),
                ("weight", 0.5, 1.5),
                ("running_mean", -1.0, 1.0),
                ("running_var", 0.1, 2.0),
            ] {
                let name = format!("{}.{}", layer.name, param);
                store.insert(spec.mode, step, name.clone(), draw(&name, &[layer.channels], low, high));
            }
        }

        store.insert(
            spec.mode,
            step,
            "output",
            draw("output", &[spec.batch, spec.n_classes], -4.0, 4.0),
        );
    }

    store.mark_complete();
    tracing::debug!(
        "Generated synthetic store: {} steps, {} layers, {} tensors",
        spec.n_steps,
        spec.layers.len(),
        store.len()
    );
    store
}

fn uniform(seed: Seed, shape: &[usize], low: f32, high: f32) -> ArrayD<f32> {
    let mut rng = seed.to_rng();
    ArrayD::from_shape_fn(IxDyn(shape), |_| rng.gen_range(low..high))
}
