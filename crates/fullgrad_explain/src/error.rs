//! Error types for fullgrad_explain.

use fullgrad_core::{CoreError, Step};
use fullgrad_store::StoreError;
use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while building saliency maps.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// A tensor the map depends on is not recorded for the step. The whole
    /// step should be skipped, never partially rendered.
    #[error("Tensor '{name}' unavailable for step {step}")]
    TensorUnavailableForStep {
        /// Tensor name.
        name: String,
        /// Requested step.
        step: Step,
    },

    /// A layer has an output gradient but lacks one of its parameters.
    #[error("Layer '{layer}' has no {kind} tensor")]
    MissingLayerTensor {
        /// Layer identifier.
        layer: String,
        /// Which tensor is missing (e.g. `running_var`).
        kind: &'static str,
    },

    /// Running variance must be strictly positive to reconstruct the implicit bias.
    #[error("Layer '{layer}' has a non-positive running variance")]
    NonPositiveVariance {
        /// Layer identifier.
        layer: String,
    },

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Tensor data conversion failed.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Store error other than a missing tensor.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ExplainError {
    /// Whether the step can be retried once more tensors have been recorded.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::TensorUnavailableForStep { .. })
    }
}

impl From<StoreError> for ExplainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TensorUnavailable { name, step, .. } => {
                Self::TensorUnavailableForStep { name, step }
            }
            other => Self::Store(other),
        }
    }
}
