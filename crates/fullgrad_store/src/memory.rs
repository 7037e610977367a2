//! In-memory tensor store.

use std::collections::{BTreeMap, BTreeSet};

use fullgrad_core::{Mode, Step};
use ndarray::ArrayD;

use crate::error::{Result, StoreError};
use crate::store::TensorStore;

type StepTensors = BTreeMap<String, ArrayD<f32>>;

/// A tensor store held entirely in memory.
///
/// # Example
///
/// ```rust
/// use fullgrad_core::{Mode, Step};
/// use fullgrad_store::{MemoryStore, TensorStore};
/// use ndarray::{ArrayD, IxDyn};
///
/// let mut store = MemoryStore::new();
/// store.insert(Mode::Eval, Step::new(1), "bn1.weight", ArrayD::ones(IxDyn(&[4])));
/// store.mark_complete();
///
/// assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(1)]);
/// assert!(store.loaded_all_steps());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    steps: BTreeMap<(Mode, Step), StepTensors>,
    complete: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tensor, replacing any previous value for the same key.
    pub fn insert(&mut self, mode: Mode, step: Step, name: impl Into<String>, value: ArrayD<f32>) {
        self.steps
            .entry((mode, step))
            .or_default()
            .insert(name.into(), value);
    }

    /// Builder-style [`MemoryStore::insert`].
    #[must_use]
    pub fn with_tensor(
        mut self,
        mode: Mode,
        step: Step,
        name: impl Into<String>,
        value: ArrayD<f32>,
    ) -> Self {
        self.insert(mode, step, name, value);
        self
    }

    /// Remove a tensor, returning it if it was present.
    pub fn remove(&mut self, mode: Mode, step: Step, name: &str) -> Option<ArrayD<f32>> {
        self.steps.get_mut(&(mode, step))?.remove(name)
    }

    /// Mark every step as written.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Iterate over every recorded tensor.
    pub fn entries(&self) -> impl Iterator<Item = (Mode, Step, &str, &ArrayD<f32>)> {
        self.steps.iter().flat_map(|(&(mode, step), tensors)| {
            tensors
                .iter()
                .map(move |(name, value)| (mode, step, name.as_str(), value))
        })
    }

    /// Number of recorded tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.values().map(BTreeMap::len).sum()
    }

    /// Check if no tensor has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TensorStore for MemoryStore {
    fn steps(&self, mode: Mode) -> Result<Vec<Step>> {
        Ok(self
            .steps
            .iter()
            .filter(|((m, _), tensors)| *m == mode && !tensors.is_empty())
            .map(|((_, step), _)| *step)
            .collect())
    }

    fn tensor_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<&String> = self.steps.values().flat_map(BTreeMap::keys).collect();
        Ok(names.into_iter().cloned().collect())
    }

    fn tensor(&self, name: &str, step: Step, mode: Mode) -> Result<ArrayD<f32>> {
        self.steps
            .get(&(mode, step))
            .and_then(|tensors| tensors.get(name))
            .cloned()
            .ok_or_else(|| StoreError::TensorUnavailable {
                name: name.to_string(),
                step,
                mode,
            })
    }

    fn loaded_all_steps(&self) -> bool {
        self.complete
    }
}
