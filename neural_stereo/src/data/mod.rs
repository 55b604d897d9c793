//! Stereo data sources and batching.
//!
//! This module provides:
//! - [`StereoSample`]: host-side image pair plus ground truth
//! - [`StereoDataset`]: the random-access dataset contract
//! - [`ListDataset`]: list-file datasets for the KITTI, satellite and SceneFlow layouts
//! - [`SyntheticStereoDataset`]: procedural pairs for tests and smoke runs
//! - [`BatchLoader`]: parallel batch assembly into [`StereoBatch`] tensors

mod dataset;
mod loader;
mod sample;
mod synthetic;

pub use dataset::{
    get_test_set, get_training_set, load_disparity, read_list, read_pfm, DatasetLayout, EntryPaths,
    ListDataset, SampleMode, StereoDataset,
};
pub use loader::{BatchLoader, StereoBatch};
pub use sample::{StereoSample, CHANNELS};
pub use synthetic::SyntheticStereoDataset;
