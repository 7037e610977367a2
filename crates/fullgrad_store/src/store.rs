//! The tensor store contract.

use fullgrad_core::{Mode, Step};
use ndarray::ArrayD;

use crate::error::Result;
use crate::query::TensorQuery;

/// A name-indexed, step-indexed source of recorded tensors.
///
/// Stores may still be receiving data while they are read: a step can be
/// listed before all of its tensors exist, in which case [`TensorStore::tensor`]
/// returns [`StoreError::TensorUnavailable`](crate::StoreError::TensorUnavailable).
pub trait TensorStore {
    /// Steps with at least one recorded tensor, sorted ascending.
    fn steps(&self, mode: Mode) -> Result<Vec<Step>>;

    /// All tensor names seen in the store, sorted.
    fn tensor_names(&self) -> Result<Vec<String>>;

    /// Value of tensor `name` at `step`.
    fn tensor(&self, name: &str, step: Step, mode: Mode) -> Result<ArrayD<f32>>;

    /// Whether the producer has finished writing every step.
    fn loaded_all_steps(&self) -> bool;

    /// Tensor names matching a query.
    fn select(&self, query: &TensorQuery) -> Result<Vec<String>> {
        Ok(query.filter(&self.tensor_names()?))
    }
}

impl<S: TensorStore + ?Sized> TensorStore for &S {
    fn steps(&self, mode: Mode) -> Result<Vec<Step>> {
        (**self).steps(mode)
    }

    fn tensor_names(&self) -> Result<Vec<String>> {
        (**self).tensor_names()
    }

    fn tensor(&self, name: &str, step: Step, mode: Mode) -> Result<ArrayD<f32>> {
        (**self).tensor(name, step, mode)
    }

    fn loaded_all_steps(&self) -> bool {
        (**self).loaded_all_steps()
    }
}
