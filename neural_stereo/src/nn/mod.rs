//! Neural network modules for disparity estimation.
//!
//! This module provides:
//! - The [`DisparityModel`] contract and the [`Predictions`] sequence it returns
//! - Two reference networks with two and three outputs

mod model;
mod stereo_net;

pub use model::{DisparityModel, Predictions};
pub use stereo_net::{DeepStereoNet, ShallowStereoNet};
