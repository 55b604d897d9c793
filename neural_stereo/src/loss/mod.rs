//! Loss functions for disparity regression.
//!
//! This module provides:
//! - Tensor validity masks matching `stereo_core::MaskPolicy`
//! - Masked smooth-L1 and robust regression losses
//! - The [`LossComposer`] combining per-head losses with fixed weights

mod composer;
pub mod mask;
mod regression;

pub use composer::{LossComposer, DEEP_HEAD_WEIGHTS, SHALLOW_HEAD_WEIGHTS};
pub use mask::{count_valid, training_mask};
pub use regression::{
    masked_mean, masked_mean_abs_error, robust_loss_masked, smooth_l1, smooth_l1_masked,
    RobustLoss,
};
