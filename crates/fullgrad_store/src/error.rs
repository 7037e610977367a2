//! Error types for fullgrad_store.

use fullgrad_core::{Mode, Step};
use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when reading or writing tensor stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The tensor has not been recorded for this step (yet).
    #[error("Tensor '{name}' is not available for step {step} ({mode})")]
    TensorUnavailable {
        /// Tensor name.
        name: String,
        /// Requested step.
        step: Step,
        /// Requested mode.
        mode: Mode,
    },

    /// Invalid regular expression in a tensor query.
    #[error("Invalid tensor query: {0}")]
    InvalidQuery(#[from] regex::Error),

    /// Invalid tensor shape.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// File format error.
    #[error("File format error: {0}")]
    FormatError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error only means "not recorded yet", which callers may retry later.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::TensorUnavailable { .. })
    }
}
