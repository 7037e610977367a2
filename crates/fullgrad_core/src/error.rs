//! Error types for fullgrad_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in fullgrad_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Batch item index out of range.
    #[error("Batch item {index} out of bounds for batch size {batch}")]
    ItemOutOfBounds {
        /// The requested item.
        index: usize,
        /// The batch size.
        batch: usize,
    },

    /// Unknown mode name.
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}
