//! Saliency heatmap overlays.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use fullgrad_core::Step;
use fullgrad_explain::{Prediction, SaliencyMap};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::colormap::Colormap;
use crate::error::{RenderError, Result};

/// Configuration for heatmap rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Per-channel mean the input image was normalized with.
    pub mean: [f32; 3],
    /// Per-channel standard deviation the input image was normalized with.
    pub std: [f32; 3],
    /// Color map for the saliency overlay.
    pub colormap: Colormap,
    /// Directory figures are written to.
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        // ImageNet statistics
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            colormap: Colormap::Jet,
            output_dir: PathBuf::from("./saliency"),
        }
    }
}

/// Caption written next to each figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Step the inputs were recorded at.
    pub step: Step,
    /// Batch item.
    pub item: usize,
    /// Figure title, e.g. `tabby cat (p=0.912)`.
    pub title: String,
    /// Predicted class index.
    pub class_index: Option<usize>,
    /// Predicted class name, when labels are known.
    pub class_name: Option<String>,
    /// Softmax probability of the predicted class.
    pub probability: Option<f32>,
}

impl Caption {
    /// Build the caption of a saliency map.
    pub fn for_map<B: Backend>(map: &SaliencyMap<B>) -> Self {
        match &map.prediction {
            Some(p) => Self::predicted(map.step, map.item, p),
            None => Self {
                step: map.step,
                item: map.item,
                title: format!("step {} item {}", map.step, map.item),
                class_index: None,
                class_name: None,
                probability: None,
            },
        }
    }

    fn predicted(step: Step, item: usize, prediction: &Prediction) -> Self {
        Self {
            step,
            item,
            title: format!("{} (p={:.3})", prediction.label(), prediction.probability),
            class_index: Some(prediction.class_index),
            class_name: prediction.class_name.clone(),
            probability: Some(prediction.probability),
        }
    }

    /// File stem shared by the figure and its caption.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("step{:06}_item{:03}", self.step.value(), self.item)
    }
}

/// A rendered side-by-side figure: input image on the left, overlay on the right.
#[derive(Debug, Clone)]
pub struct RenderedFigure {
    /// The composed RGB image, `2W x H`.
    pub image: RgbImage,
    /// Caption for the figure.
    pub caption: Caption,
}

impl RenderedFigure {
    /// Write `<stem>.png` and `<stem>.json` into `dir`, creating it if needed.
    ///
    /// Returns the two paths.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let stem = self.caption.file_stem();
        let png = dir.join(format!("{}.png", stem));
        let json = dir.join(format!("{}.json", stem));

        self.image.save(&png)?;
        fs::write(&json, serde_json::to_vec_pretty(&self.caption)?)?;
        Ok((png, json))
    }
}

/// Renders saliency maps over their input images.
#[derive(Debug, Clone, Default)]
pub struct HeatmapRenderer {
    config: RenderConfig,
}

impl HeatmapRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Use a different color map.
    #[must_use]
    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.config.colormap = colormap;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Undo dataset normalization of a `(3, H, W)` image.
    ///
    /// Returns an 8-bit channel-last `(H, W, 3)` array.
    pub fn denormalize(&self, image: &Array3<f32>) -> Result<Array3<u8>> {
        let (channels, height, width) = image.dim();
        if channels != 3 {
            return Err(RenderError::ShapeMismatch(format!(
                "expected a 3-channel image, got {} channels",
                channels
            )));
        }

        Ok(Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
            let value = image[[c, y, x]] * self.config.std[c] + self.config.mean[c];
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        }))
    }

    /// Color a `[0, 1]` saliency map, `(H, W)` to `(H, W, 3)`.
    pub fn colorize(&self, saliency: &Array2<f32>) -> Array3<u8> {
        let (height, width) = saliency.dim();
        let mut heat = Array3::zeros((height, width, 3));
        for ((y, x), &s) in saliency.indexed_iter() {
            let level = ((1.0 - s.clamp(0.0, 1.0)) * 255.0).round() as u8;
            let color = self.config.colormap.lookup(level);
            for (c, v) in color.into_iter().enumerate() {
                heat[[y, x, c]] = v;
            }
        }
        heat
    }

    /// Blend heat and image additively and rescale so the brightest value is 1.
    pub fn overlay(&self, heat: &Array3<u8>, image: &Array3<u8>) -> Result<Array3<f32>> {
        if heat.dim() != image.dim() {
            return Err(RenderError::ShapeMismatch(format!(
                "heatmap {:?} != image {:?}",
                heat.dim(),
                image.dim()
            )));
        }

        let blended = heat.mapv(|v| f32::from(v) / 255.0) + image.mapv(|v| f32::from(v) / 255.0);
        let max = blended.iter().copied().fold(0.0f32, f32::max);
        Ok(if max > 0.0 { blended / max } else { blended })
    }

    /// Render a saliency map over its `(3, H, W)` normalized input image.
    pub fn render<B: Backend>(
        &self,
        saliency: &SaliencyMap<B>,
        image: &Array3<f32>,
    ) -> Result<RenderedFigure> {
        let values = saliency.to_array()?;
        let (_, height, width) = image.dim();
        if values.dim() != (height, width) {
            return Err(RenderError::ShapeMismatch(format!(
                "saliency map {:?} != image size {:?}",
                values.dim(),
                (height, width)
            )));
        }

        let input = self.denormalize(image)?;
        let overlay = self.overlay(&self.colorize(&values), &input)?;

        let mut figure = RgbImage::new((2 * width) as u32, height as u32);
        for y in 0..height {
            for x in 0..width {
                let left = [input[[y, x, 0]], input[[y, x, 1]], input[[y, x, 2]]];
                let right = [overlay[[y, x, 0]], overlay[[y, x, 1]], overlay[[y, x, 2]]]
                    .map(|v| (v * 255.0).round() as u8);
                figure.put_pixel(x as u32, y as u32, Rgb(left));
                figure.put_pixel((width + x) as u32, y as u32, Rgb(right));
            }
        }

        let caption = Caption::for_map(saliency);
        tracing::debug!("Rendered '{}' ({}x{})", caption.title, width, height);
        Ok(RenderedFigure {
            image: figure,
            caption,
        })
    }

    /// Render and write into the configured output directory.
    pub fn render_to_dir<B: Backend>(
        &self,
        saliency: &SaliencyMap<B>,
        image: &Array3<f32>,
    ) -> Result<(PathBuf, PathBuf)> {
        self.render(saliency, image)?.save(&self.config.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fullgrad_core::backend::NdArray;

    type TestBackend = NdArray;

    fn diagonal_map(size: usize) -> SaliencyMap<TestBackend> {
        let device = Default::default();
        let data: Vec<f32> = (0..size * size)
            .map(|i| if i / size == i % size { 1.0 } else { 0.0 })
            .collect();
        let values = Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device).reshape([size, size]);
        SaliencyMap::new(values, Step::new(4), 1)
    }

    #[test]
    fn test_denormalize_inverts_dataset_stats() {
        let renderer = HeatmapRenderer::default();
        let config = renderer.config().clone();
        // Pixels normalized from 0.5 gray
        let image = Array3::from_shape_fn((3, 2, 2), |(c, _, _)| (0.5 - config.mean[c]) / config.std[c]);

        let rgb = renderer.denormalize(&image).unwrap();
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert!(rgb.iter().all(|&v| v == 128 || v == 127));
    }

    #[test]
    fn test_denormalize_rejects_grayscale() {
        let renderer = HeatmapRenderer::default();
        assert!(renderer.denormalize(&Array3::zeros((1, 4, 4))).is_err());
    }

    #[test]
    fn test_colorize_puts_salient_pixels_in_red() {
        let renderer = HeatmapRenderer::default();
        let saliency = Array2::from_shape_vec((1, 2), vec![1.0, 0.0]).unwrap();
        let heat = renderer.colorize(&saliency);

        let hot = [heat[[0, 0, 0]], heat[[0, 0, 1]], heat[[0, 0, 2]]];
        let cold = [heat[[0, 1, 0]], heat[[0, 1, 1]], heat[[0, 1, 2]]];
        assert!(hot[0] > hot[2]);
        assert!(cold[2] > cold[0]);
    }

    #[test]
    fn test_overlay_is_rescaled_to_unit_max() {
        let renderer = HeatmapRenderer::default();
        let heat = Array3::from_elem((2, 2, 3), 200u8);
        let image = Array3::from_elem((2, 2, 3), 100u8);

        let overlay = renderer.overlay(&heat, &image).unwrap();
        let max = overlay.iter().copied().fold(0.0f32, f32::max);
        let min = overlay.iter().copied().fold(f32::INFINITY, f32::min);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(min >= 0.0);

        assert!(renderer.overlay(&heat, &Array3::zeros((2, 3, 3))).is_err());
    }

    #[test]
    fn test_render_writes_side_by_side_figure() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HeatmapRenderer::new(RenderConfig {
            output_dir: dir.path().join("figures"),
            ..Default::default()
        });
        let map = diagonal_map(6).with_prediction(Prediction {
            class_index: 3,
            class_name: Some("tabby".to_string()),
            probability: 0.75,
        });
        let image = Array3::zeros((3, 6, 6));

        let (png, json) = renderer.render_to_dir(&map, &image).unwrap();
        assert!(png.ends_with("step000004_item001.png"));

        let written = image::open(&png).unwrap();
        assert_eq!((written.width(), written.height()), (12, 6));

        let caption: Caption = serde_json::from_slice(&std::fs::read(json).unwrap()).unwrap();
        assert_eq!(caption.title, "tabby (p=0.750)");
        assert_eq!(caption.step, Step::new(4));
        assert_eq!(caption.class_index, Some(3));
        assert_eq!(caption.class_name.as_deref(), Some("tabby"));
    }

    #[test]
    fn test_render_rejects_size_mismatch() {
        let renderer = HeatmapRenderer::default();
        let map = diagonal_map(4);
        assert!(renderer.render(&map, &Array3::zeros((3, 5, 4))).is_err());
    }

    #[test]
    fn test_caption_without_prediction() {
        let caption = Caption::for_map(&diagonal_map(2));
        assert_eq!(caption.title, "step 4 item 1");
        assert!(caption.probability.is_none());
        assert_eq!(caption.file_stem(), "step000004_item001");
    }
}
