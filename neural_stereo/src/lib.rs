//! # neural_stereo
//!
//! Training and validation of stereo disparity networks with Burn.
//!
//! The crate drives a disparity network through masked multi-head supervision:
//! per-batch training steps with a weighted smooth-L1 (or robust) loss, a
//! validation pass reporting end-point-error and 3-pixel error, a stepped
//! learning-rate schedule, and snapshot persistence with best-score tracking.
//! Host-side metrics and policies come from `stereo_core`.
//!
//! ## Features
//!
//! - **Model contract**: [`DisparityModel`] returns an ordered set of maps;
//!   two-output and three-output networks are handled uniformly
//! - **Loss composition**: fixed head weights, robust loss for KITTI-style data
//! - **Data**: list-file datasets, a synthetic dataset, a parallel batch loader
//! - **Training loop**: [`StereoTrainer`] and [`run_training`]
//! - **Persistence**: Burn MessagePack records plus JSON metadata
//! - **Metrics**: CSV scalar logs keyed by global step counters
//!
//! ## Quick Start
//!
//! ```ignore
//! use neural_stereo::prelude::*;
//! use burn::backend::{Autodiff, NdArray};
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = TrainingConfig::new(240, 528).with_model(ModelVariant::Shallow);
//! let model = ShallowStereoNet::<MyBackend>::new(&ShallowStereoNetConfig::new(192), &device);
//! let optimizer = config.optimizer().init();
//! let mut trainer = StereoTrainer::new(model, optimizer, config, device)?;
//!
//! let train = BatchLoader::training(SyntheticStereoDataset::new(8, 24, 48), 2, 2, 123)?;
//! let val = BatchLoader::test(SyntheticStereoDataset::new(2, 24, 48), 1, 1, 123)?;
//! let checkpoints = CheckpointManager::new("checkpoints")?;
//! let mut sink = CsvScalarWriter::for_experiment("logs", "demo")?;
//!
//! run_training(&mut trainer, &train, &val, &checkpoints, &mut sink)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! stereo_core (masks, metrics, schedule, policies)
//!     │
//!     ▼
//! neural_stereo
//!     config ─► nn ─► loss ─► training ◄─ data
//!                               │
//!                               ├─► metrics (scalar sink)
//!                               └─► checkpoints (save_path/epoch_<n>, best)
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend
//! - `wgpu`: GPU backend, selected by the `train` binary with `--cuda 1`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod nn;
pub mod training;

// Re-export key types for convenience
pub use config::{DatasetFlags, ModelVariant, TrainingConfig};
pub use data::{BatchLoader, StereoBatch, StereoDataset};
pub use error::{NeuralStereoError, Result};
pub use loss::LossComposer;
pub use metrics::{CsvScalarWriter, MemorySink, MetricsSink};
pub use nn::{DisparityModel, Predictions};
pub use training::{run_training, CheckpointManager, StereoTrainer};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        DatasetFlags, DeepStereoNetConfig, ModelVariant, RobustLossConfig,
        ShallowStereoNetConfig, TrainingConfig,
    };
    pub use crate::data::{
        get_test_set, get_training_set, BatchLoader, DatasetLayout, ListDataset, StereoBatch,
        StereoDataset, StereoSample, SyntheticStereoDataset,
    };
    pub use crate::error::{NeuralStereoError, Result};
    pub use crate::loss::{LossComposer, RobustLoss};
    pub use crate::metrics::{tags, CsvScalarWriter, MemorySink, MetricsSink};
    pub use crate::nn::{DeepStereoNet, DisparityModel, Predictions, ShallowStereoNet};
    pub use crate::training::{
        load_model_params, run_training, CheckpointManager, CheckpointMetadata, EpochSummary,
        RunSummary, StereoTrainer, TrainStepOutput, ValStepOutput, ValidationSummary,
    };

    pub use stereo_core::{MaskPolicy, StepCounters};
}
