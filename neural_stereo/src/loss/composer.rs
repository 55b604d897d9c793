//! Weighted combination of per-head losses.

use burn::prelude::*;

use crate::config::TrainingConfig;
use crate::error::{NeuralStereoError, Result};
use crate::nn::Predictions;

use super::regression::{robust_loss_masked, smooth_l1_masked, RobustLoss};

/// Head weights for two-output models, coarse to fine.
pub const SHALLOW_HEAD_WEIGHTS: [f32; 2] = [0.4, 1.2];

/// Head weights for three-output models, coarse to fine.
pub const DEEP_HEAD_WEIGHTS: [f32; 3] = [0.2, 0.6, 1.0];

/// Combines per-head regression losses into the scalar training loss.
///
/// The weighting is chosen by the number of prediction maps:
///
/// ```text
/// 2 maps: 0.4 * SL1(d1) + 1.2 * L(d2)
/// 3 maps: 0.2 * SL1(d0) + 0.6 * SL1(d1) + 1.0 * L(d2)
/// ```
///
/// where `L` is smooth-L1, or the robust loss for KITTI-style datasets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossComposer {
    /// Loss applied to the finest map instead of smooth-L1, if any.
    robust: Option<RobustLoss>,
}

impl LossComposer {
    /// Composer using smooth-L1 on every head.
    pub fn smooth_l1() -> Self {
        Self { robust: None }
    }

    /// Composer using `loss` on the finest head.
    pub fn with_robust(loss: RobustLoss) -> Self {
        Self { robust: Some(loss) }
    }

    /// Composer matching the dataset flags of a training configuration.
    pub fn from_config(config: &TrainingConfig) -> Self {
        if config.dataset.uses_robust_loss() {
            Self::with_robust(RobustLoss::from(&config.robust_loss))
        } else {
            Self::smooth_l1()
        }
    }

    /// Whether the finest head uses the robust loss.
    pub fn is_robust(&self) -> bool {
        self.robust.is_some()
    }

    /// Compose the scalar loss over the valid elements of `mask`.
    pub fn compose<B: Backend>(
        &self,
        predictions: &Predictions<B>,
        target: Tensor<B, 3>,
        mask: Tensor<B, 3, Bool>,
    ) -> Result<Tensor<B, 1>> {
        let weights: &[f32] = match predictions.len() {
            2 => &SHALLOW_HEAD_WEIGHTS,
            3 => &DEEP_HEAD_WEIGHTS,
            got => return Err(NeuralStereoError::PredictionArity { got }),
        };

        let last = weights.len() - 1;
        let loss = predictions
            .maps()
            .iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (map, &weight))| {
                let term = match self.robust {
                    Some(ref robust) if i == last => {
                        robust_loss_masked(robust, map.clone(), target.clone(), mask.clone())
                    }
                    _ => smooth_l1_masked(map.clone(), target.clone(), mask.clone()),
                };
                term.mul_scalar(weight)
            })
            .reduce(|acc, term| acc + term)
            .ok_or(NeuralStereoError::PredictionArity { got: 0 })?;

        Ok(loss)
    }
}

impl Default for LossComposer {
    fn default() -> Self {
        Self::smooth_l1()
    }
}
