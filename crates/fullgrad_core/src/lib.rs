//! # fullgrad_core
//!
//! Core types shared by the fullgrad-rs crates.
//!
//! This crate provides:
//! - [`Step`] and [`Mode`] for addressing recorded tensors
//! - [`ImageShape`] for image tensor shape metadata
//! - [`ImageTensor`] wrapper for Burn tensors with shape validation
//! - [`Seed`] for deterministic random number generation
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Image data follows the convention `(B, C, H, W)`:
//! - `B`: Batch size (number of images)
//! - `C`: Channels
//! - `H`, `W`: Spatial height and width
//!
//! ## Example
//!
//! ```rust,ignore
//! use fullgrad_core::{ImageShape, ImageTensor, Step};
//!
//! let shape = ImageShape::new(1, 3, 224, 224);
//! let image = ImageTensor::<NdArray>::zeros(shape, &device);
//! let step = Step::new(12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod seed;
mod shape;
mod step;
mod tensor;

pub use error::{CoreError, Result};
pub use seed::Seed;
pub use shape::ImageShape;
pub use step::{Mode, Step};
pub use tensor::ImageTensor;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;
}
