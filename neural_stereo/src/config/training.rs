//! Training configuration types.

use std::fmt;
use std::str::FromStr;

use burn::config::Config;
use burn::optim::AdamConfig;
use serde::{Deserialize, Serialize};
use stereo_core::{LearningRateSchedule, MaskPolicy, SavePolicy};

use crate::error::NeuralStereoError;

/// Network variant, selected by name on the command line.
///
/// The variants differ in how many disparity maps they produce, which in turn
/// selects the loss weighting (see [`crate::loss::LossComposer`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Two prediction maps.
    #[serde(rename = "GANet11")]
    Shallow,
    /// Three prediction maps at increasing refinement depth.
    #[serde(rename = "GANet_deep")]
    Deep,
}

impl ModelVariant {
    /// Name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Shallow => "GANet11",
            ModelVariant::Deep => "GANet_deep",
        }
    }

    /// Number of prediction maps produced by the variant.
    pub fn num_predictions(self) -> usize {
        match self {
            ModelVariant::Shallow => 2,
            ModelVariant::Deep => 3,
        }
    }
}

impl FromStr for ModelVariant {
    type Err = NeuralStereoError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "GANet11" => Ok(ModelVariant::Shallow),
            "GANet_deep" => Ok(ModelVariant::Deep),
            other => Err(NeuralStereoError::UnknownModel {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dataset variant flags. They can be combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFlags {
    /// KITTI 2012 layout.
    pub kitti: bool,
    /// KITTI 2015 layout.
    pub kitti2015: bool,
    /// Satellite imagery layout.
    pub satellite: bool,
}

impl DatasetFlags {
    /// Whether the final loss term uses the robust loss (sparse, noisy ground truth).
    pub fn uses_robust_loss(&self) -> bool {
        self.kitti || self.kitti2015
    }
}

/// Parameters of the robust regression loss.
#[derive(Config, Debug)]
pub struct RobustLossConfig {
    /// Residual magnitude where the loss switches from quadratic to sublinear.
    #[config(default = 3.0)]
    pub threshold: f32,

    /// Scaling exponent of the outlier branch (growth ~ residual^(1/alpha)).
    #[config(default = 2.0)]
    pub alpha: f32,
}

impl Default for RobustLossConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the stereo trainer.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Crop height of training and validation samples.
    pub crop_height: usize,

    /// Crop width of training and validation samples.
    pub crop_width: usize,

    /// Maximum representable disparity.
    #[config(default = 192)]
    pub max_disp: usize,

    /// Training batch size.
    #[config(default = 1)]
    pub batch_size: usize,

    /// Validation batch size.
    #[config(default = 1)]
    pub test_batch_size: usize,

    /// Number of epochs.
    #[config(default = 100)]
    pub epochs: usize,

    /// Base learning rate.
    #[config(default = 0.001)]
    pub learning_rate: f64,

    /// Adam first-moment decay.
    #[config(default = 0.9)]
    pub beta_1: f32,

    /// Adam second-moment decay.
    #[config(default = 0.999)]
    pub beta_2: f32,

    /// Last epoch trained at the base learning rate.
    #[config(default = 400)]
    pub lr_decay_epoch: usize,

    /// Learning-rate multiplier after `lr_decay_epoch`.
    #[config(default = 0.1)]
    pub lr_decay_factor: f64,

    /// Unconditional checkpoint interval in epochs.
    #[config(default = 10)]
    pub save_interval: usize,

    /// Random seed for the backend and data augmentation.
    #[config(default = 123)]
    pub seed: u64,

    /// Maximum random horizontal shift applied to training samples.
    #[config(default = 0)]
    pub shift: usize,

    /// Randomly train on the mirrored right view.
    #[config(default = false)]
    pub left_right: bool,

    /// Worker threads used to assemble batches.
    #[config(default = 1)]
    pub threads: usize,

    /// Dataset variant flags.
    #[config(default = "DatasetFlags::default()")]
    pub dataset: DatasetFlags,

    /// Network variant.
    #[config(default = "ModelVariant::Deep")]
    pub model: ModelVariant,

    /// Robust loss parameters (KITTI-style datasets).
    #[config(default = "RobustLossConfig::new()")]
    pub robust_loss: RobustLossConfig,
}

impl TrainingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.crop_height == 0 || self.crop_width == 0 {
            return Err(NeuralStereoError::invalid_config(
                "crop_height and crop_width must be positive",
            ));
        }
        if self.max_disp == 0 {
            return Err(NeuralStereoError::invalid_config("max_disp must be positive"));
        }
        if self.batch_size == 0 || self.test_batch_size == 0 {
            return Err(NeuralStereoError::invalid_config("batch sizes must be positive"));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(NeuralStereoError::invalid_config("learning_rate must be positive"));
        }
        if self.robust_loss.threshold <= 0.0 || self.robust_loss.alpha <= 0.0 {
            return Err(NeuralStereoError::invalid_config(
                "robust loss threshold and alpha must be positive",
            ));
        }
        if self.shift >= self.crop_width {
            return Err(NeuralStereoError::invalid_config("shift must be smaller than crop_width"));
        }

        Ok(())
    }

    /// Crop shape as `[height, width]`.
    pub fn crop_shape(&self) -> [usize; 2] {
        [self.crop_height, self.crop_width]
    }

    /// Validity masking policy for this run.
    pub fn mask_policy(&self) -> MaskPolicy {
        MaskPolicy::new(self.max_disp as f32)
    }

    /// Learning-rate schedule for this run.
    pub fn lr_schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule::new(self.learning_rate)
            .with_decay_after_epoch(self.lr_decay_epoch)
            .with_decay_factor(self.lr_decay_factor)
    }

    /// Checkpoint save policy for this run.
    pub fn save_policy(&self) -> SavePolicy {
        SavePolicy::new(self.save_interval)
    }

    /// Adam optimizer configuration.
    pub fn optimizer(&self) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(self.beta_1)
            .with_beta_2(self.beta_2)
    }
}
