//! Step and epoch outputs of the trainer.

use stereo_core::{TrainAverages, ValidationAverages};

/// Result of one applied training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainStepOutput {
    /// Composed loss.
    pub loss: f64,
    /// Per-head mean absolute error, coarse to fine.
    pub errors: [f64; 3],
    /// Global training step index (1-based).
    pub step: u64,
    /// Valid ground-truth pixels in the batch.
    pub valid_pixels: usize,
}

impl TrainStepOutput {
    /// Whether the composed loss was NaN.
    pub fn is_nan(&self) -> bool {
        self.loss.is_nan()
    }

    /// Error of the finest head.
    pub fn finest_error(&self) -> f64 {
        self.errors[2]
    }
}

/// Result of one validation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValStepOutput {
    /// End-point-error over the training mask.
    pub epe: f64,
    /// 3-pixel error over the strict validation mask, if it has any pixel.
    pub three_pixel_error: Option<f64>,
    /// Global validation step index (1-based).
    pub step: u64,
    /// Valid ground-truth pixels in the batch.
    pub valid_pixels: usize,
}

/// Outcome of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// Epoch number (1-based).
    pub epoch: usize,
    /// Batches seen, including skipped ones.
    pub batches: usize,
    /// Averages over non-skipped batches; `None` if all were skipped.
    pub averages: Option<TrainAverages>,
}

impl EpochSummary {
    /// Batches that contributed to the averages.
    pub fn valid_iterations(&self) -> usize {
        self.averages.map_or(0, |a| a.iterations)
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSummary {
    /// Batches seen, including skipped ones.
    pub batches: usize,
    /// Averages over non-skipped batches; `None` if all were skipped.
    pub averages: Option<ValidationAverages>,
}

impl ValidationSummary {
    /// Checkpoint selection score: the average 3-pixel error.
    pub fn score(&self) -> Option<f64> {
        self.averages.and_then(|a| a.three_pixel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summaries() {
        let train = EpochSummary {
            epoch: 3,
            batches: 2,
            averages: None,
        };
        assert_eq!(train.valid_iterations(), 0);

        let val = ValidationSummary {
            batches: 2,
            averages: None,
        };
        assert_eq!(val.score(), None);
    }

    #[test]
    fn test_score_is_three_pixel_error() {
        let val = ValidationSummary {
            batches: 1,
            averages: Some(ValidationAverages {
                epe: 1.2,
                three_pixel_error: Some(0.04),
                iterations: 1,
            }),
        };
        assert_eq!(val.score(), Some(0.04));
    }
}
