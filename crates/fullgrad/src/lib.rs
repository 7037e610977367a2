//! # fullgrad
//!
//! Full-gradient saliency maps for image classifiers, built from tensors
//! recorded while the model was evaluated.
//!
//! fullgrad-rs provides:
//!
//! - **Stores**: step-indexed tensor recordings in memory or as `.npy` directories
//! - **Explain**: implicit-bias reconstruction and the full-gradient accumulator
//! - **Render**: heatmap overlays written as PNG figures with JSON captions
//! - **Monitor**: a polling loop that renders steps while a job is still recording
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fullgrad::prelude::*;
//!
//! let store = NpyDirStore::open("./recording")?;
//! let names = TensorNames::default();
//!
//! for step in store.steps(Mode::Eval)? {
//!     let map = build_saliency_map::<NdArray, _>(&store, &names, step, Mode::Eval, 0, &device)?;
//!     let image = to_array3(collect_step::<NdArray, _>(&store, &names, step, Mode::Eval, &device)?
//!         .image
//!         .item(0)?)?;
//!     HeatmapRenderer::default().render(&map, &image)?.save("./saliency")?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use fullgrad_core as core;
pub use fullgrad_explain as explain;
pub use fullgrad_monitor as monitor;
pub use fullgrad_render as render;
pub use fullgrad_store as store;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use fullgrad::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use fullgrad_core::{ImageShape, ImageTensor, Mode, Seed, Step};

    // Stores
    pub use fullgrad_store::{
        synthetic_store, write_npy_dir, MemoryStore, NpyDirStore, SyntheticSpec, TensorQuery,
        TensorStore,
    };

    // Explain
    pub use fullgrad_explain::{
        build_saliency_map, collect_step, full_gradient, implicit_bias, normalize, to_array3,
        LayerKey, LayerSet, Prediction, SaliencyMap, StepInputs, TensorNames,
    };

    // Render
    pub use fullgrad_render::{Colormap, HeatmapRenderer, RenderConfig, RenderedFigure};

    // Monitor
    pub use fullgrad_monitor::{
        CancelToken, PollConfig, PollReport, SaliencyStepHandler, StepPoller, WatchConfig,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use fullgrad_core::backend::NdArray;
}

/// All module for importing everything.
pub mod all {
    pub use super::prelude::*;

    // Additional exports
    pub use fullgrad_explain::{
        contribution_trace, decode_prediction, implicit_biases, input_term, interpolation_matrix,
        layer_contributions, layer_term, upsample_linear, BatchNormNames, LayerRecord,
    };
    pub use fullgrad_monitor::{PollState, StepHandler};
    pub use fullgrad_render::Caption;
    pub use fullgrad_store::{SyntheticLayer, END_OF_JOB_MARKER};
}
