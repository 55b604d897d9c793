//! Configuration types for neural_stereo.
//!
//! This module provides Burn-style configuration structs for training and for
//! the reference network variants.

mod network;
mod training;

pub use network::{DeepStereoNetConfig, ShallowStereoNetConfig};
pub use training::{DatasetFlags, ModelVariant, RobustLossConfig, TrainingConfig};
