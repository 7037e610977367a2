//! # fullgrad_store
//!
//! Step-indexed tensor stores for fullgrad-rs.
//!
//! This crate provides:
//! - [`TensorStore`], the lookup contract used by the saliency pipeline
//! - [`TensorQuery`] for regex selection of tensor names
//! - [`MemoryStore`] for in-process recordings and tests
//! - [`NpyDirStore`] for recordings laid out as `.npy` files on disk
//! - [`synthetic_store`] for deterministic demo recordings
//!
//! ## Example
//!
//! ```rust,ignore
//! use fullgrad_core::{Mode, Step};
//! use fullgrad_store::{NpyDirStore, TensorQuery, TensorStore};
//!
//! let store = NpyDirStore::open("./recording")?;
//! for step in store.steps(Mode::Eval)? {
//!     let grads = store.select(&TensorQuery::new(r"^gradient/.*_output$")?)?;
//!     let input = store.tensor("input_image", step, Mode::Eval)?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod npy_dir;
mod query;
mod store;
pub mod synthetic;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use npy_dir::{write_npy_dir, NpyDirStore, END_OF_JOB_MARKER};
pub use query::TensorQuery;
pub use store::TensorStore;
pub use synthetic::{synthetic_store, SyntheticLayer, SyntheticSpec};
