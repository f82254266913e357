//! Single-slot checkpoint store.
//!
//! The slot holds the parameters of the best epoch seen so far as one
//! safetensors file.  Writes go to a sibling temp file that is renamed over
//! the slot, so a reader never sees a half-written checkpoint.  Loading is
//! all-or-nothing: the key set and every shape are checked before any
//! parameter is overwritten.

use std::path::{Path, PathBuf};

use candle_core::Device;
use candle_nn::VarMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CheckpointError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint {0} does not exist")]
    NotFound(PathBuf),

    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model has a parameter the checkpoint lacks.
    #[error("checkpoint is missing parameter `{0}`")]
    MissingKey(String),

    /// The checkpoint has a parameter the model lacks.
    #[error("checkpoint has unexpected parameter `{0}`")]
    UnexpectedKey(String),

    #[error("parameter `{key}` has shape {found:?}, model expects {expected:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("parameter map lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replace the slot with the current contents of `varmap`.
    pub fn save(&self, varmap: &VarMap) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = self.temp_path();
        varmap.save(&tmp)?;
        std::fs::rename(&tmp, &self.path).map_err(|source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        })?;

        log::debug!("checkpoint: wrote {}", self.path.display());
        Ok(())
    }

    /// Overwrite every parameter of `varmap` with the slot's contents.
    ///
    /// Fails without touching `varmap` when the key sets differ or any shape
    /// disagrees.
    pub fn load_into(&self, varmap: &VarMap) -> Result<(), CheckpointError> {
        if !self.exists() {
            return Err(CheckpointError::NotFound(self.path.clone()));
        }
        let saved = candle_core::safetensors::load(&self.path, &Device::Cpu)?;

        let data = varmap.data().lock().map_err(|_| CheckpointError::Poisoned)?;

        let mut missing: Vec<&String> = data
            .keys()
            .filter(|k| !saved.contains_key(k.as_str()))
            .collect();
        missing.sort();
        if let Some(key) = missing.first() {
            return Err(CheckpointError::MissingKey(key.to_string()));
        }
        let mut unexpected: Vec<&String> =
            saved.keys().filter(|k| !data.contains_key(*k)).collect();
        unexpected.sort();
        if let Some(key) = unexpected.first() {
            return Err(CheckpointError::UnexpectedKey(key.to_string()));
        }

        for (key, var) in data.iter() {
            let tensor = &saved[key];
            if tensor.dims() != var.dims() {
                return Err(CheckpointError::ShapeMismatch {
                    key: key.clone(),
                    expected: var.dims().to_vec(),
                    found: tensor.dims().to_vec(),
                });
            }
        }

        for (key, var) in data.iter() {
            let value = saved[key].to_dtype(var.dtype())?.to_device(var.device())?;
            var.set(&value)?;
        }

        log::info!(
            "checkpoint: loaded {} parameters from {}",
            data.len(),
            self.path.display()
        );
        Ok(())
    }
}
