//! Validity masks over ground-truth disparity maps.
//!
//! Zero (or near-zero) disparities mark unlabeled or occluded pixels, and values
//! above `max_disp` cannot be represented by the network. Two policies exist:
//!
//! - **training**: `MIN_VALID_DISPARITY <= d <= max_disp` (inclusive upper bound),
//!   used for the loss, per-head errors and end-point-error.
//! - **validation**: `MIN_VALID_DISPARITY < d < max_disp` (strict on both ends),
//!   used only for the 3-pixel error.
//!
//! The two differ only at `d == MIN_VALID_DISPARITY` and `d == max_disp`. The
//! asymmetry is kept as-is so reported numbers stay comparable with earlier runs.

/// Smallest disparity treated as labeled.
pub const MIN_VALID_DISPARITY: f32 = 0.001;

/// Masking policy parameterized by the maximum representable disparity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskPolicy {
    /// Maximum disparity the model can predict.
    pub max_disp: f32,
}

impl MaskPolicy {
    /// Create a policy for the given maximum disparity.
    pub fn new(max_disp: f32) -> Self {
        Self { max_disp }
    }

    /// Training/loss validity of a single ground-truth value.
    #[inline]
    pub fn is_valid_training(&self, target: f32) -> bool {
        target >= MIN_VALID_DISPARITY && target <= self.max_disp
    }

    /// Strict validity used by the 3-pixel error.
    #[inline]
    pub fn is_valid_validation(&self, target: f32) -> bool {
        target > MIN_VALID_DISPARITY && target < self.max_disp
    }

    /// Training mask for a whole disparity map.
    pub fn training_mask(&self, target: &[f32]) -> Vec<bool> {
        target.iter().map(|&t| self.is_valid_training(t)).collect()
    }

    /// Validation (strict) mask for a whole disparity map.
    pub fn validation_mask(&self, target: &[f32]) -> Vec<bool> {
        target.iter().map(|&t| self.is_valid_validation(t)).collect()
    }

    /// Number of pixels passing the training mask.
    pub fn count_valid_training(&self, target: &[f32]) -> usize {
        target.iter().filter(|&&t| self.is_valid_training(t)).count()
    }

    /// Number of pixels passing the validation mask.
    pub fn count_valid_validation(&self, target: &[f32]) -> usize {
        target.iter().filter(|&&t| self.is_valid_validation(t)).count()
    }
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self::new(192.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_mask_bounds_inclusive() {
        let policy = MaskPolicy::new(192.0);
        assert!(policy.is_valid_training(MIN_VALID_DISPARITY));
        assert!(policy.is_valid_training(192.0));
        assert!(!policy.is_valid_training(0.0));
        assert!(!policy.is_valid_training(192.5));
    }

    #[test]
    fn test_validation_mask_bounds_strict() {
        let policy = MaskPolicy::new(192.0);
        assert!(!policy.is_valid_validation(MIN_VALID_DISPARITY));
        assert!(!policy.is_valid_validation(192.0));
        assert!(policy.is_valid_validation(0.5));
        assert!(policy.is_valid_validation(191.9));
    }

    #[test]
    fn test_masks_differ_only_at_max_disp() {
        let policy = MaskPolicy::new(64.0);
        let target = [0.0, 0.5, 10.0, 63.99, 64.0, 64.01, 200.0];

        let train = policy.training_mask(&target);
        let val = policy.validation_mask(&target);

        assert_eq!(train, vec![false, true, true, true, true, false, false]);
        assert_eq!(val, vec![false, true, true, true, false, false, false]);
    }

    #[test]
    fn test_counts() {
        let policy = MaskPolicy::new(10.0);
        let target = [0.0, 1.0, 10.0, 11.0];
        assert_eq!(policy.count_valid_training(&target), 2);
        assert_eq!(policy.count_valid_validation(&target), 1);
    }

    #[test]
    fn test_nan_target_is_invalid() {
        let policy = MaskPolicy::default();
        assert!(!policy.is_valid_training(f32::NAN));
        assert!(!policy.is_valid_validation(f32::NAN));
    }
}
