//! Snapshot save/load for models and optimizers.
//!
//! A snapshot is a directory holding the module record, the optimizer record
//! and a JSON metadata file:
//!
//! ```text
//! <save_path>/epoch_<n>/{model.mpk, optimizer.mpk, metadata.json}
//! <save_path>/best/{model.mpk, optimizer.mpk, metadata.json}
//! ```
//!
//! `best/` is a copy of the latest improving epoch snapshot. Resuming
//! restores module parameters only; the optimizer state and the epoch number
//! start fresh.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder, RecorderError};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::error::{NeuralStereoError, Result};

/// Module record file stem inside a snapshot directory.
pub const MODEL_FILE: &str = "model";
/// Optimizer record file stem inside a snapshot directory.
pub const OPTIMIZER_FILE: &str = "optimizer";
/// Metadata file inside a snapshot directory.
pub const METADATA_FILE: &str = "metadata.json";
/// Directory of the best snapshot.
pub const BEST_DIR: &str = "best";

/// Metadata stored next to each snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch the snapshot was taken after (1-based).
    pub epoch: usize,
    /// Validation score of that epoch, if any.
    pub score: Option<f64>,
    /// Learning rate in effect.
    pub learning_rate: f64,
    /// Global training steps so far.
    pub train_steps: u64,
    /// Global validation steps so far.
    pub val_steps: u64,
}

/// Writes snapshots under a save directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    root: PathBuf,
    recorder: NamedMpkFileRecorder<FullPrecisionSettings>,
}

impl CheckpointManager {
    /// Create a manager writing under `root`, creating the directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            recorder: NamedMpkFileRecorder::new(),
        })
    }

    /// Save directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot directory of `epoch`.
    pub fn epoch_dir(&self, epoch: usize) -> PathBuf {
        self.root.join(format!("epoch_{}", epoch))
    }

    /// Best snapshot directory.
    pub fn best_dir(&self) -> PathBuf {
        self.root.join(BEST_DIR)
    }

    /// Write the snapshot of `metadata.epoch`, and overwrite `best/` when `is_best`.
    ///
    /// Returns the epoch snapshot directory.
    pub fn save<B, M, O>(
        &self,
        model: &M,
        optimizer: &O,
        metadata: &CheckpointMetadata,
        is_best: bool,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let dir = self.epoch_dir(metadata.epoch);
        fs::create_dir_all(&dir)?;

        model
            .clone()
            .save_file(dir.join(MODEL_FILE), &self.recorder)
            .map_err(recorder_error)?;
        self.recorder
            .record(optimizer.to_record(), dir.join(OPTIMIZER_FILE))
            .map_err(recorder_error)?;
        fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(metadata)?)?;
        log::info!("Checkpoint saved to {}", dir.display());

        if is_best {
            let best = self.best_dir();
            copy_snapshot(&dir, &best)?;
            log::info!("Best checkpoint saved to {}", best.display());
        }

        Ok(dir)
    }

    /// Restore module parameters from `path`, see [`load_model_params`].
    pub fn load_model_params<B: Backend, M: Module<B>>(
        &self,
        model: M,
        path: &Path,
        device: &B::Device,
    ) -> Result<M> {
        load_params_with(&self.recorder, model, path, device)
    }
}

/// Overwrite `dst` with the files of `src`.
fn copy_snapshot(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Read the metadata of a snapshot directory.
pub fn load_metadata(dir: &Path) -> Result<CheckpointMetadata> {
    let text = fs::read_to_string(dir.join(METADATA_FILE))?;
    Ok(serde_json::from_str(&text)?)
}

/// Locate the module record referenced by a resume path.
///
/// Accepts a snapshot directory, a record file, or a record path without its
/// extension.
pub fn resolve_model_path(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        let candidate = path.join(MODEL_FILE).with_extension("mpk");
        return candidate.is_file().then_some(candidate);
    }
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let with_ext = path.with_extension("mpk");
    with_ext.is_file().then_some(with_ext)
}

/// Restore module parameters from a resume path.
///
/// A missing checkpoint is not an error: a warning is logged and `model` is
/// returned unchanged.
pub fn load_model_params<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    load_params_with(&recorder, model, path, device)
}

fn load_params_with<B: Backend, M: Module<B>>(
    recorder: &NamedMpkFileRecorder<FullPrecisionSettings>,
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    let Some(file) = resolve_model_path(path) else {
        log::warn!("=> no checkpoint found at '{}'", path.display());
        return Ok(model);
    };

    log::info!("=> loading checkpoint '{}'", file.display());
    model
        .load_file(file, recorder, device)
        .map_err(recorder_error)
}

fn recorder_error(err: RecorderError) -> NeuralStereoError {
    NeuralStereoError::Recorder(err.to_string())
}
