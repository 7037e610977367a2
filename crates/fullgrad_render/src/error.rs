//! Error types for fullgrad_render.

use thiserror::Error;

/// Result type alias using [`RenderError`].
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while rendering heatmaps.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Image and saliency map disagree in shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Saliency map extraction failed.
    #[error("Explain error: {0}")]
    Explain(#[from] fullgrad_explain::ExplainError),

    /// Image encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Caption serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
