//! # fullgrad_explain
//!
//! Full-gradient saliency maps for fullgrad-rs.
//!
//! This crate provides:
//! - Min-max normalization
//! - Implicit-bias reconstruction from batch-normalization statistics
//! - Order-1 spatial upsampling
//! - The full-gradient accumulator, written as a fold over layer terms
//! - Keyed collection of per-layer tensors from a [`TensorStore`](fullgrad_store::TensorStore)
//! - Class prediction decoding from model logits
//!
//! ## Example
//!
//! ```rust,ignore
//! use fullgrad_explain::{build_saliency_map, TensorNames};
//!
//! let names = TensorNames::default();
//! let map = build_saliency_map::<NdArray, _>(&store, &names, step, Mode::Eval, 0, &device)?;
//! assert_eq!(map.shape(), [224, 224]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod convert;
mod error;
mod fullgrad;
mod implicit_bias;
mod layers;
mod normalize;
mod prediction;
mod saliency;
mod upsample;

pub use convert::{to_array2, to_array3, to_tensor};
pub use error::{ExplainError, Result};
pub use fullgrad::{
    build_saliency_map, contribution_trace, full_gradient, input_term, layer_contributions,
    layer_term,
};
pub use implicit_bias::{implicit_bias, implicit_biases, BatchNormNames};
pub use layers::{collect_step, LayerKey, LayerRecord, LayerSet, StepInputs, TensorNames};
pub use normalize::normalize;
pub use prediction::{decode_prediction, Prediction};
pub use saliency::SaliencyMap;
pub use upsample::{interpolation_matrix, upsample_linear};
