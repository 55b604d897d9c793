//! Tensor versions of the validity masks.
//!
//! Masks are built from the ground truth only and are boolean tensors, so no
//! gradient ever flows through them.

use burn::prelude::*;
use burn::tensor::ElementConversion;
use stereo_core::{MaskPolicy, MIN_VALID_DISPARITY};

/// Training mask: `MIN_VALID_DISPARITY <= target <= max_disp`.
pub fn training_mask<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    policy: &MaskPolicy,
) -> Tensor<B, D, Bool> {
    let lower = target.clone().greater_equal_elem(MIN_VALID_DISPARITY).float();
    let upper = target.lower_equal_elem(policy.max_disp).float();
    (lower * upper).greater_elem(0.5)
}

/// Number of `true` elements of a mask.
pub fn count_valid<B: Backend, const D: usize>(mask: Tensor<B, D, Bool>) -> usize {
    let count: i64 = mask.int().sum().into_scalar().elem();
    count.max(0) as usize
}
