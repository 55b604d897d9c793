//! Training infrastructure for stereo disparity networks.
//!
//! This module provides:
//! - `StereoTrainer`: training and validation steps over a model and optimizer
//! - Step and epoch outputs
//! - Snapshot save/load and best-snapshot tracking
//! - `run_training`: the epoch loop

mod checkpoint;
mod metrics;
mod orchestrator;
mod trainer;

pub use checkpoint::{
    load_metadata, load_model_params, resolve_model_path, CheckpointManager, CheckpointMetadata,
    BEST_DIR, METADATA_FILE, MODEL_FILE, OPTIMIZER_FILE,
};
pub use metrics::{EpochSummary, TrainStepOutput, ValStepOutput, ValidationSummary};
pub use orchestrator::{run_training, EpochReport, RunSummary};
pub use trainer::StereoTrainer;
