//! Masked regression losses on disparity maps.
//!
//! Every reduction is a mean over the valid elements of the mask. Residuals at
//! masked-out elements are replaced by zero before the elementwise loss, so
//! they contribute neither value nor gradient, even when the prediction there
//! is NaN.

use burn::prelude::*;

use crate::config::RobustLossConfig;

/// Elementwise smooth-L1 (beta = 1): `0.5 x²` for `|x| < 1`, `|x| - 0.5` otherwise.
pub fn smooth_l1<B: Backend, const D: usize>(diff: Tensor<B, D>) -> Tensor<B, D> {
    let abs = diff.abs();
    let quadratic = abs.clone().powf_scalar(2.0).mul_scalar(0.5);
    let linear = abs.clone().sub_scalar(0.5);
    linear.mask_where(abs.lower_elem(1.0), quadratic)
}

/// Robust loss for noisy ground truth.
///
/// For a residual `r` with threshold `t` and exponent `alpha`:
///
/// ```text
/// |r| <= t : r² / (2t)
/// |r| >  t : t/2 + alpha * ((1 + |r| - t)^(1/alpha) - 1)
/// ```
///
/// Both branches meet with value `t/2` and slope 1 at `|r| = t`; beyond it the
/// loss grows like `|r|^(1/alpha)`, so outliers pull less than under L1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustLoss {
    /// Residual magnitude where the outlier branch starts.
    pub threshold: f32,
    /// Scaling exponent of the outlier branch.
    pub alpha: f32,
}

impl RobustLoss {
    /// Create a robust loss with the given parameters.
    pub fn new(threshold: f32, alpha: f32) -> Self {
        Self { threshold, alpha }
    }

    /// Elementwise loss of a residual tensor.
    pub fn elementwise<B: Backend, const D: usize>(&self, diff: Tensor<B, D>) -> Tensor<B, D> {
        let t = self.threshold;
        let alpha = self.alpha;
        let abs = diff.abs();

        let inlier = abs.clone().powf_scalar(2.0).div_scalar(2.0 * t);
        let excess = abs.clone().sub_scalar(t).clamp_min(0.0);
        let outlier = excess
            .add_scalar(1.0)
            .powf_scalar(1.0 / alpha)
            .sub_scalar(1.0)
            .mul_scalar(alpha)
            .add_scalar(t / 2.0);

        outlier.mask_where(abs.lower_equal_elem(t), inlier)
    }
}

impl From<&RobustLossConfig> for RobustLoss {
    fn from(config: &RobustLossConfig) -> Self {
        Self::new(config.threshold, config.alpha)
    }
}

impl Default for RobustLoss {
    fn default() -> Self {
        Self::from(&RobustLossConfig::default())
    }
}

/// Mean of `values` over the `true` elements of `mask`.
///
/// With an empty mask the result is NaN (0/0); callers skip such batches.
pub fn masked_mean<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
) -> Tensor<B, 1> {
    let count = mask.clone().float().sum();
    values.mask_fill(mask.bool_not(), 0.0).sum() / count
}

/// `prediction - target`, zeroed outside `mask`.
fn masked_residual<B: Backend, const D: usize>(
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
) -> Tensor<B, D> {
    (prediction - target).mask_fill(mask.bool_not(), 0.0)
}

/// Masked mean smooth-L1 between prediction and target.
pub fn smooth_l1_masked<B: Backend, const D: usize>(
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
) -> Tensor<B, 1> {
    let diff = masked_residual(prediction, target, mask.clone());
    masked_mean(smooth_l1(diff), mask)
}

/// Masked mean robust loss between prediction and target.
pub fn robust_loss_masked<B: Backend, const D: usize>(
    loss: &RobustLoss,
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
) -> Tensor<B, 1> {
    let diff = masked_residual(prediction, target, mask.clone());
    masked_mean(loss.elementwise(diff), mask)
}

/// Masked mean absolute error, used for reporting per-head errors.
pub fn masked_mean_abs_error<B: Backend, const D: usize>(
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
) -> Tensor<B, 1> {
    let diff = masked_residual(prediction, target, mask.clone());
    masked_mean(diff.abs(), mask)
}
