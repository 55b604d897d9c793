//! Disparity error metrics and per-epoch accumulators.
//!
//! All functions work on flat, row-major host buffers. The caller guarantees that
//! prediction and target describe the same pixels; lengths are checked.

use crate::error::{ensure_same_len, Result};
use crate::mask::MaskPolicy;

/// Error assigned to pixels outside the validation mask before thresholding.
///
/// It fails the absolute criterion, but an out-of-range target (at least
/// 200000, or infinite) still passes the relative one, so invalid pixels are
/// also excluded from the correct count explicitly.
pub const INVALID_ERROR_SENTINEL: f32 = 10000.0;

/// Absolute threshold (in pixels) of the 3-pixel error.
pub const THREE_PIXEL_THRESHOLD: f32 = 3.0;

/// Relative threshold (fraction of the ground truth) of the 3-pixel error.
pub const THREE_PIXEL_RELATIVE_THRESHOLD: f32 = 0.05;

/// Mean absolute difference between prediction and target over `mask`.
///
/// Returns `Ok(None)` when the mask selects no pixel.
pub fn end_point_error(prediction: &[f32], target: &[f32], mask: &[bool]) -> Result<Option<f32>> {
    ensure_same_len(target.len(), prediction.len())?;
    ensure_same_len(target.len(), mask.len())?;

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for ((&p, &t), &valid) in prediction.iter().zip(target).zip(mask) {
        if valid {
            sum += (p - t).abs() as f64;
            count += 1;
        }
    }

    if count == 0 {
        Ok(None)
    } else {
        Ok(Some((sum / count as f64) as f32))
    }
}

/// Whether a single absolute error counts as correct for the 3-pixel metric.
#[inline]
pub fn is_three_pixel_correct(abs_error: f32, target: f32) -> bool {
    abs_error < THREE_PIXEL_THRESHOLD || abs_error < target * THREE_PIXEL_RELATIVE_THRESHOLD
}

/// Fraction of strictly-valid pixels whose error exceeds both 3 px and 5 %.
///
/// Pixels outside the validation mask get [`INVALID_ERROR_SENTINEL`] as their
/// error and never count as correct; the correct count is divided by the
/// number of valid pixels. Returns `Ok(None)` when no pixel is valid.
pub fn three_pixel_error(
    prediction: &[f32],
    target: &[f32],
    policy: &MaskPolicy,
) -> Result<Option<f64>> {
    ensure_same_len(target.len(), prediction.len())?;

    let mut valid = 0usize;
    let mut correct = 0usize;
    for (&p, &t) in prediction.iter().zip(target) {
        let is_valid = policy.is_valid_validation(t);
        let abs_error = if is_valid {
            valid += 1;
            (t - p).abs()
        } else {
            INVALID_ERROR_SENTINEL
        };
        if is_valid && is_three_pixel_correct(abs_error, t) {
            correct += 1;
        }
    }

    if valid == 0 {
        return Ok(None);
    }

    Ok(Some(1.0 - correct as f64 / valid as f64))
}

/// Epoch averages of the training phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainAverages {
    /// Average composed loss.
    pub loss: f64,
    /// Average per-head mean absolute error, coarse to fine.
    pub errors: [f64; 3],
    /// Number of batches that contributed.
    pub iterations: usize,
}

/// Running sums for the training phase of one epoch.
#[derive(Debug, Clone, Default)]
pub struct TrainAccumulator {
    loss: f64,
    errors: [f64; 3],
    valid_iterations: usize,
}

impl TrainAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the results of one non-skipped batch.
    pub fn add(&mut self, loss: f64, errors: [f64; 3]) {
        self.loss += loss;
        for (sum, e) in self.errors.iter_mut().zip(errors) {
            *sum += e;
        }
        self.valid_iterations += 1;
    }

    /// Number of batches accumulated so far.
    pub fn valid_iterations(&self) -> usize {
        self.valid_iterations
    }

    /// Epoch averages, or `None` if every batch was skipped.
    pub fn averages(&self) -> Option<TrainAverages> {
        if self.valid_iterations == 0 {
            return None;
        }
        let n = self.valid_iterations as f64;
        Some(TrainAverages {
            loss: self.loss / n,
            errors: self.errors.map(|e| e / n),
            iterations: self.valid_iterations,
        })
    }

    /// Clear all sums.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Epoch averages of the validation phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationAverages {
    /// Average end-point-error.
    pub epe: f64,
    /// Average 3-pixel error, if any batch had strictly-valid pixels.
    pub three_pixel_error: Option<f64>,
    /// Number of batches that contributed to the EPE.
    pub iterations: usize,
}

/// Running sums for the validation phase of one epoch.
///
/// The 3-pixel error keeps its own count: a batch can be valid under the
/// training mask and still have no pixel strictly inside the validation mask.
#[derive(Debug, Clone, Default)]
pub struct ValidationAccumulator {
    epe: f64,
    three_pixel: f64,
    valid_iterations: usize,
    three_pixel_iterations: usize,
}

impl ValidationAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the results of one non-skipped batch.
    pub fn add(&mut self, epe: f64, three_pixel_error: Option<f64>) {
        self.epe += epe;
        self.valid_iterations += 1;
        if let Some(e) = three_pixel_error {
            self.three_pixel += e;
            self.three_pixel_iterations += 1;
        }
    }

    /// Number of batches accumulated so far.
    pub fn valid_iterations(&self) -> usize {
        self.valid_iterations
    }

    /// Epoch averages, or `None` if every batch was skipped.
    pub fn averages(&self) -> Option<ValidationAverages> {
        if self.valid_iterations == 0 {
            return None;
        }
        let three_pixel_error = (self.three_pixel_iterations > 0)
            .then(|| self.three_pixel / self.three_pixel_iterations as f64);
        Some(ValidationAverages {
            epe: self.epe / self.valid_iterations as f64,
            three_pixel_error,
            iterations: self.valid_iterations,
        })
    }
}
