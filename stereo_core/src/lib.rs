//! # stereo_core
//!
//! Host-side algorithms for training and validating stereo disparity networks.
//!
//! This crate holds the parts of the training loop that do not need a tensor
//! library: validity masks over ground-truth disparity, end-point-error and
//! 3-pixel error, per-epoch accumulators, the learning-rate schedule and the
//! checkpoint selection policy. `neural_stereo` builds the Burn training loop
//! on top of it.
//!
//! ## Modules
//!
//! - [`mask`]: Training and validation validity masks ([`MaskPolicy`])
//! - [`metrics`]: EPE, 3-pixel error and epoch accumulators
//! - [`schedule`]: Piecewise-constant learning-rate schedule
//! - [`policy`]: Snapshot save policy and best-score tracking
//! - [`counters`]: Global train/validation step counters
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```
//! use stereo_core::prelude::*;
//!
//! let policy = MaskPolicy::new(192.0);
//! let target = [10.0, 0.0, 50.0];
//! let prediction = [12.9, 4.0, 60.0];
//!
//! let mask = policy.training_mask(&target);
//! let epe = end_point_error(&prediction, &target, &mask).unwrap();
//! assert!(epe.is_some());
//!
//! let err = three_pixel_error(&prediction, &target, &policy).unwrap().unwrap();
//! assert!((err - 0.5).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counters;
pub mod error;
pub mod mask;
pub mod metrics;
pub mod policy;
pub mod schedule;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::counters::StepCounters;
    pub use crate::error::CoreError;
    pub use crate::mask::{MaskPolicy, MIN_VALID_DISPARITY};
    pub use crate::metrics::{
        end_point_error, is_three_pixel_correct, three_pixel_error, TrainAccumulator,
        TrainAverages, ValidationAccumulator, ValidationAverages, INVALID_ERROR_SENTINEL,
    };
    pub use crate::policy::{BestScoreTracker, SavePolicy};
    pub use crate::schedule::LearningRateSchedule;
}

pub use counters::StepCounters;
pub use error::CoreError;
pub use mask::{MaskPolicy, MIN_VALID_DISPARITY};
pub use metrics::{
    end_point_error, is_three_pixel_correct, three_pixel_error, TrainAccumulator, TrainAverages,
    ValidationAccumulator, ValidationAverages, INVALID_ERROR_SENTINEL, THREE_PIXEL_RELATIVE_THRESHOLD,
    THREE_PIXEL_THRESHOLD,
};
pub use policy::{BestScoreTracker, SavePolicy};
pub use schedule::LearningRateSchedule;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_epoch_of_metrics() {
        let policy = MaskPolicy::new(192.0);
        let mut acc = ValidationAccumulator::new();

        let batches: [(&[f32], &[f32]); 2] = [
            (&[10.0, 20.0, 30.0, 40.0], &[11.0, 20.0, 30.0, 48.0]),
            // Fully occluded batch: skipped like the training loop does.
            (&[5.0, 5.0, 5.0, 5.0], &[0.0, 0.0, 0.0, 0.0]),
        ];

        for (pred, target) in batches {
            if policy.count_valid_training(target) == 0 {
                continue;
            }
            let mask = policy.training_mask(target);
            let epe = end_point_error(pred, target, &mask).unwrap().unwrap();
            let px3 = three_pixel_error(pred, target, &policy).unwrap();
            acc.add(epe as f64, px3);
        }

        let avg = acc.averages().unwrap();
        assert_eq!(avg.iterations, 1);
        assert!((avg.epe - 2.25).abs() < 1e-6);
        // Only the last pixel (|8| >= 3, 8 >= 2.4) is wrong.
        assert!((avg.three_pixel_error.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_and_policy_over_run() {
        let schedule = LearningRateSchedule::new(0.01);
        let save = SavePolicy::default();
        let mut best = BestScoreTracker::new();
        let scores = [0.5, 0.4, 0.45, 0.45, 0.45, 0.45, 0.3, 0.35, 0.35, 0.35];

        let mut saved = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            let epoch = i + 1;
            assert_eq!(schedule.learning_rate(epoch), 0.01);
            let is_best = best.observe(Some(score));
            if save.should_save(epoch, is_best) {
                saved.push(epoch);
            }
        }

        assert_eq!(saved, vec![1, 2, 7, 10]);
    }
}
