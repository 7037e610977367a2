//! # fullgrad_render
//!
//! Heatmap rendering for fullgrad-rs saliency maps.
//!
//! This crate provides:
//! - [`Colormap`] lookups for 8-bit saliency levels
//! - [`HeatmapRenderer`], which overlays a saliency map on its input image
//!   and writes a side-by-side PNG with a JSON caption
//!
//! ## Example
//!
//! ```rust,ignore
//! use fullgrad_render::{HeatmapRenderer, RenderConfig};
//!
//! let renderer = HeatmapRenderer::new(RenderConfig::default());
//! let figure = renderer.render(&saliency, &image)?;
//! let (png, caption) = figure.save("./saliency")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod colormap;
mod error;
mod heatmap;

pub use colormap::Colormap;
pub use error::{RenderError, Result};
pub use heatmap::{Caption, HeatmapRenderer, RenderConfig, RenderedFigure};
