//! Error types for fullgrad_monitor.

use std::time::Duration;

use fullgrad_core::CoreError;
use fullgrad_explain::ExplainError;
use fullgrad_render::RenderError;
use fullgrad_store::StoreError;
use thiserror::Error;

/// Result type alias using [`MonitorError`].
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can end a polling run.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Building a saliency map failed.
    #[error("Explain error: {0}")]
    Explain(#[from] ExplainError),

    /// Reading the store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Rendering a figure failed.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The run did not finish within the configured timeout.
    #[error("Polling timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("Polling cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether the step only lacks tensors that have not been recorded yet.
    #[must_use]
    pub fn is_step_unavailable(&self) -> bool {
        match self {
            Self::Explain(err) => err.is_unavailable(),
            Self::Store(err) => err.is_unavailable(),
            Self::Render(RenderError::Explain(err)) => err.is_unavailable(),
            _ => false,
        }
    }
}
