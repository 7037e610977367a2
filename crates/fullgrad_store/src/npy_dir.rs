//! Tensor store backed by a directory of `.npy` files.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   training_job_end.ts          written once every step is on disk
//!   eval/
//!     000000000001/
//!       input_image.npy
//!       gradient%2Finput_image.npy
//!       bn1.running_var.npy
//! ```
//!
//! Tensor names are percent-encoded so that `/` can appear in names.

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fullgrad_core::{Mode, Step};
use ndarray::ArrayD;
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyExt};

use crate::error::{Result, StoreError};
use crate::memory::MemoryStore;
use crate::store::TensorStore;

/// Marker file written by the producer once all steps are on disk.
pub const END_OF_JOB_MARKER: &str = "training_job_end.ts";

const NPY_EXTENSION: &str = "npy";
const PARTIAL_EXTENSION: &str = "tmp";

/// A tensor store reading a directory tree of `.npy` files.
///
/// The directory is re-scanned on every call, so steps written after the
/// store was opened become visible on the next poll. A step directory counts
/// as recorded once it holds at least one `.npy` file, and a file that is
/// still being written reads as unavailable rather than corrupt.
#[derive(Debug, Clone)]
pub struct NpyDirStore {
    root: PathBuf,
}

impl NpyDirStore {
    /// Open a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not an existing directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::FormatError(format!(
                "Tensor store root {:?} is not a directory",
                root
            )));
        }
        Ok(Self { root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mode_dir(&self, mode: Mode) -> PathBuf {
        self.root.join(mode.as_str())
    }

    fn step_dir(&self, mode: Mode, step: Step) -> PathBuf {
        step_dir(&self.root, mode, step)
    }

    fn step_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for mode in [Mode::Train, Mode::Eval, Mode::Global] {
            for step in self.steps(mode)? {
                dirs.push(self.step_dir(mode, step));
            }
        }
        Ok(dirs)
    }
}

impl TensorStore for NpyDirStore {
    fn steps(&self, mode: Mode) -> Result<Vec<Step>> {
        let dir = self.mode_dir(mode);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut steps = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
                Some(value) if has_tensors(&entry.path())? => steps.push(Step::new(value)),
                Some(_) => tracing::debug!("Step directory {:?} has no tensors yet", entry.path()),
                None => tracing::debug!("Ignoring non-step entry {:?}", entry.path()),
            }
        }
        steps.sort();
        Ok(steps)
    }

    fn tensor_names(&self) -> Result<Vec<String>> {
        let mut names = std::collections::BTreeSet::new();
        for dir in self.step_dirs()? {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(NPY_EXTENSION) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.insert(decode_name(stem));
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    fn tensor(&self, name: &str, step: Step, mode: Mode) -> Result<ArrayD<f32>> {
        let path = tensor_path(&self.root, mode, step, name);
        let unavailable = || StoreError::TensorUnavailable {
            name: name.to_string(),
            step,
            mode,
        };
        if !path.is_file() {
            return Err(unavailable());
        }
        match read_array(&path)? {
            Some(array) => Ok(array),
            None => {
                tracing::debug!("Tensor file {:?} is incomplete", path);
                Err(unavailable())
            }
        }
    }

    fn loaded_all_steps(&self) -> bool {
        self.root.join(END_OF_JOB_MARKER).is_file()
    }
}

/// Write every tensor of `store` under `root` in the [`NpyDirStore`] layout.
///
/// Each tensor is written to `<name>.npy.tmp` and renamed into place, so
/// readers never see a partial file. The end-of-job marker is written last,
/// and only if the store is complete.
pub fn write_npy_dir<P: AsRef<Path>>(store: &MemoryStore, root: P) -> Result<()> {
    let root = root.as_ref();
    for (mode, step, name, value) in store.entries() {
        let path = tensor_path(root, mode, step, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension(format!("{}.{}", NPY_EXTENSION, PARTIAL_EXTENSION));
        let writer = BufWriter::new(fs::File::create(&partial)?);
        value
            .write_npy(writer)
            .map_err(|e| StoreError::FormatError(format!("Failed to write {:?}: {}", path, e)))?;
        fs::rename(&partial, &path)?;
    }

    if store.loaded_all_steps() {
        fs::write(root.join(END_OF_JOB_MARKER), b"")?;
    }

    tracing::info!("Wrote {} tensors to {:?}", store.len(), root);
    Ok(())
}

fn step_dir(root: &Path, mode: Mode, step: Step) -> PathBuf {
    root.join(mode.as_str()).join(format!("{:012}", step.value()))
}

fn tensor_path(root: &Path, mode: Mode, step: Step, name: &str) -> PathBuf {
    step_dir(root, mode, step).join(format!("{}.{}", encode_name(name), NPY_EXTENSION))
}

fn has_tensors(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.path().extension().and_then(|e| e.to_str()) == Some(NPY_EXTENSION) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read an `.npy` file as f32, narrowing f64 data.
///
/// Returns `None` if the file ends early, i.e. the producer is still writing it.
fn read_array(path: &Path) -> Result<Option<ArrayD<f32>>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }

    let reader = BufReader::new(fs::File::open(path)?);
    let err = match ArrayD::<f32>::read_npy(reader) {
        Ok(arr) => return Ok(Some(arr)),
        Err(e) if is_truncated(&e) => return Ok(None),
        Err(e) => e,
    };

    // Recordings from float64 producers are narrowed on read
    let reader = BufReader::new(fs::File::open(path)?);
    match ArrayD::<f64>::read_npy(reader) {
        Ok(arr) => Ok(Some(arr.mapv(|x| x as f32))),
        Err(e) if is_truncated(&e) => Ok(None),
        Err(_) => Err(StoreError::FormatError(format!(
            "Failed to read npy file {:?}: {}",
            path, err
        ))),
    }
}

/// Whether a read failed because the file ended before header or data did.
fn is_truncated(err: &ReadNpyError) -> bool {
    if matches!(err, ReadNpyError::MissingData) {
        return true;
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        source = e.source();
    }
    false
}

fn encode_name(name: &str) -> String {
    name.replace('%', "%25").replace('/', "%2F")
}

fn decode_name(stem: &str) -> String {
    stem.replace("%2F", "/").replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_name_encoding_round_trip() {
        for name in ["gradient/bn1_output", "bn1.weight", "odd%name/x"] {
            assert_eq!(decode_name(&encode_name(name)), name);
        }
        assert!(!encode_name("gradient/input_image").contains('/'));
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NpyDirStore::open(dir.path().join("missing")).is_err());
        assert!(NpyDirStore::open(dir.path()).is_ok());
    }

    #[test]
    fn test_written_store_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let grad = ArrayD::from_shape_fn(IxDyn(&[1, 2, 3, 3]), |idx| idx[3] as f32);
        let mut memory = MemoryStore::new()
            .with_tensor(Mode::Eval, Step::new(10), "gradient/bn1_output", grad.clone())
            .with_tensor(Mode::Eval, Step::new(3), "bn1.weight", ArrayD::ones(IxDyn(&[2])));

        write_npy_dir(&memory, dir.path()).unwrap();
        let store = NpyDirStore::open(dir.path()).unwrap();

        assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(3), Step::new(10)]);
        assert_eq!(
            store.tensor_names().unwrap(),
            vec!["bn1.weight".to_string(), "gradient/bn1_output".to_string()]
        );
        assert_eq!(
            store.tensor("gradient/bn1_output", Step::new(10), Mode::Eval).unwrap(),
            grad
        );
        assert!(store
            .tensor("gradient/bn1_output", Step::new(3), Mode::Eval)
            .unwrap_err()
            .is_unavailable());
        assert!(!store.loaded_all_steps());

        memory.mark_complete();
        write_npy_dir(&memory, dir.path()).unwrap();
        assert!(store.loaded_all_steps());
    }

    #[test]
    fn test_partially_written_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new().with_tensor(
            Mode::Eval,
            Step::new(1),
            "gradient/bn1_output",
            ArrayD::from_elem(IxDyn(&[1, 4, 8, 8]), 0.5),
        );
        write_npy_dir(&memory, dir.path()).unwrap();

        let path = tensor_path(dir.path(), Mode::Eval, Step::new(1), "gradient/bn1_output");
        let bytes = fs::read(&path).unwrap();
        let store = NpyDirStore::open(dir.path()).unwrap();

        // Cut inside the data, inside the header, and before anything was flushed
        for len in [bytes.len() / 2, 20, 0] {
            fs::write(&path, &bytes[..len]).unwrap();
            let err = store
                .tensor("gradient/bn1_output", Step::new(1), Mode::Eval)
                .unwrap_err();
            assert!(err.is_unavailable(), "len {}: {}", len, err);
        }

        fs::write(&path, &bytes).unwrap();
        assert!(store.tensor("gradient/bn1_output", Step::new(1), Mode::Eval).is_ok());
    }

    #[test]
    fn test_corrupt_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = tensor_path(dir.path(), Mode::Eval, Step::new(1), "bn1.bias");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"definitely not an npy file, long enough to hold a header").unwrap();

        let store = NpyDirStore::open(dir.path()).unwrap();
        let err = store.tensor("bn1.bias", Step::new(1), Mode::Eval).unwrap_err();
        assert!(matches!(err, StoreError::FormatError(_)));
    }

    #[test]
    fn test_writer_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new()
            .with_tensor(Mode::Eval, Step::new(1), "bn1.weight", ArrayD::ones(IxDyn(&[3])));
        write_npy_dir(&memory, dir.path()).unwrap();

        let files: Vec<String> = fs::read_dir(step_dir(dir.path(), Mode::Eval, Step::new(1)))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["bn1.weight.npy".to_string()]);
    }

    #[test]
    fn test_f64_files_are_narrowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = tensor_path(dir.path(), Mode::Eval, Step::new(1), "bn1.running_var");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let values = ArrayD::<f64>::from_elem(IxDyn(&[4]), 0.25);
        values
            .write_npy(BufWriter::new(fs::File::create(&path).unwrap()))
            .unwrap();

        let store = NpyDirStore::open(dir.path()).unwrap();
        let read = store.tensor("bn1.running_var", Step::new(1), Mode::Eval).unwrap();
        assert_eq!(read, ArrayD::<f32>::from_elem(IxDyn(&[4]), 0.25));
    }

    #[test]
    fn test_non_step_directories_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("eval").join("scratch")).unwrap();
        let memory = MemoryStore::new()
            .with_tensor(Mode::Eval, Step::new(4), "bn1.weight", ArrayD::ones(IxDyn(&[3])));
        write_npy_dir(&memory, dir.path()).unwrap();

        let store = NpyDirStore::open(dir.path()).unwrap();
        assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(4)]);
    }

    #[test]
    fn test_steps_without_tensors_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new()
            .with_tensor(Mode::Eval, Step::new(1), "bn1.weight", ArrayD::ones(IxDyn(&[3])));
        write_npy_dir(&memory, dir.path()).unwrap();

        let empty = step_dir(dir.path(), Mode::Eval, Step::new(2));
        fs::create_dir_all(&empty).unwrap();
        let store = NpyDirStore::open(dir.path()).unwrap();
        assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(1)]);

        // A file still being written does not make the step visible
        fs::write(empty.join("bn1.weight.npy.tmp"), b"").unwrap();
        assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(1)]);

        fs::write(empty.join("bn1.weight.npy"), b"").unwrap();
        assert_eq!(store.steps(Mode::Eval).unwrap(), vec![Step::new(1), Step::new(2)]);
    }
}
