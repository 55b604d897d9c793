//! Deterministic synthetic stereo pairs.

use std::collections::HashSet;

use rand::rngs::StdRng;

use crate::error::{NeuralStereoError, Result};

use super::dataset::StereoDataset;
use super::sample::{StereoSample, CHANNELS};

/// Procedural stereo pairs with constant disparity.
///
/// The left view is a smooth per-channel pattern; the right view is the same
/// pattern moved by the disparity, so the pair is geometrically consistent.
/// Selected indices can be marked invalid: their ground truth is all zero
/// (fully unlabeled), which the training loop must skip.
#[derive(Debug, Clone)]
pub struct SyntheticStereoDataset {
    len: usize,
    height: usize,
    width: usize,
    disparity: f32,
    invalid: HashSet<usize>,
}

impl SyntheticStereoDataset {
    /// `len` samples of `height` x `width` pixels with disparity 4.
    pub fn new(len: usize, height: usize, width: usize) -> Self {
        Self {
            len,
            height,
            width,
            disparity: 4.0,
            invalid: HashSet::new(),
        }
    }

    /// Set the constant disparity of every valid sample.
    pub fn with_disparity(mut self, disparity: f32) -> Self {
        self.disparity = disparity;
        self
    }

    /// Mark samples whose ground truth is entirely unlabeled.
    pub fn with_invalid_indices(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.invalid.extend(indices);
        self
    }

    fn pattern(&self, index: usize, c: usize, y: usize, x: f32) -> f32 {
        let phase = index as f32 * 0.37 + c as f32 * 1.3;
        (x * 0.45 + phase).sin() + (y as f32 * 0.3 + phase).cos() * 0.5
    }
}

impl StereoDataset for SyntheticStereoDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize, _rng: &mut StdRng) -> Result<StereoSample> {
        if index >= self.len {
            return Err(NeuralStereoError::dataset(format!(
                "index {} out of range for {} samples",
                index, self.len
            )));
        }

        let (h, w) = (self.height, self.width);
        let mut left = Vec::with_capacity(CHANNELS * h * w);
        let mut right = Vec::with_capacity(CHANNELS * h * w);
        for c in 0..CHANNELS {
            for y in 0..h {
                for x in 0..w {
                    left.push(self.pattern(index, c, y, x as f32));
                    // Right pixel x sees the left pixel x + d.
                    right.push(self.pattern(index, c, y, x as f32 + self.disparity));
                }
            }
        }

        let value = if self.invalid.contains(&index) {
            0.0
        } else {
            self.disparity
        };

        StereoSample::new(left, right, vec![value; h * w], h, w)
    }
}
