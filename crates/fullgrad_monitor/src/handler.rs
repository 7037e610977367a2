//! Saliency rendering as a [`StepHandler`].

use std::path::PathBuf;

use burn::prelude::*;
use fullgrad_core::{Mode, Step};
use fullgrad_explain::{collect_step, full_gradient, to_array3, TensorNames};
use fullgrad_render::HeatmapRenderer;
use fullgrad_store::TensorStore;

use crate::config::WatchConfig;
use crate::error::Result;
use crate::poller::StepHandler;

/// Builds and renders one full-gradient figure per batch item of each step.
#[derive(Debug, Clone)]
pub struct SaliencyStepHandler<B: Backend> {
    names: TensorNames,
    renderer: HeatmapRenderer,
    labels: Vec<String>,
    device: B::Device,
    written: Vec<PathBuf>,
}

impl<B: Backend> SaliencyStepHandler<B> {
    /// Create a handler.
    pub fn new(names: TensorNames, renderer: HeatmapRenderer, device: B::Device) -> Self {
        Self {
            names,
            renderer,
            labels: Vec::new(),
            device,
            written: Vec::new(),
        }
    }

    /// Create a handler from a watch configuration.
    pub fn from_config(config: &WatchConfig, device: B::Device) -> Self {
        Self::new(
            config.tensors.clone(),
            HeatmapRenderer::new(config.render.clone()),
            device,
        )
        .with_labels(config.labels.clone())
    }

    /// Name predicted classes with `labels`.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// PNG files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Render every batch item of `step`, returning the PNG paths.
    pub fn render_step<S: TensorStore>(
        &mut self,
        store: &S,
        step: Step,
        mode: Mode,
    ) -> Result<Vec<PathBuf>> {
        let inputs = collect_step::<B, S>(store, &self.names, step, mode, &self.device)?;
        tracing::debug!(
            "Step {}: {} images, {} layers",
            step,
            inputs.batch(),
            inputs.layers.len()
        );

        // Build every map before writing anything so a failing item leaves no partial step
        let maps = (0..inputs.batch())
            .map(|item| full_gradient(&inputs, item, &self.labels))
            .collect::<fullgrad_explain::Result<Vec<_>>>()?;

        let mut written = Vec::with_capacity(maps.len());
        for map in &maps {
            let image = to_array3(inputs.image.item(map.item)?)?;
            let (png, _) = self.renderer.render_to_dir(map, &image)?;
            tracing::debug!("Wrote {}", png.display());
            written.push(png);
        }

        self.written.extend(written.iter().cloned());
        Ok(written)
    }
}

impl<B: Backend, S: TensorStore> StepHandler<S> for SaliencyStepHandler<B> {
    fn handle_step(&mut self, store: &S, step: Step, mode: Mode) -> Result<()> {
        self.render_step(store, step, mode).map(|_| ())
    }
}
