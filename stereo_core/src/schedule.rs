//! Epoch-indexed learning-rate schedule.

/// Piecewise-constant learning-rate schedule.
///
/// `epoch <= decay_after_epoch` trains at `base_lr`, later epochs at
/// `base_lr * decay_factor`. Epochs are 1-based. The schedule holds no state
/// beyond its parameters, so resuming at any epoch recomputes the same rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    /// Learning rate of the first phase.
    pub base_lr: f64,
    /// Last epoch trained at `base_lr`.
    pub decay_after_epoch: usize,
    /// Multiplier applied after `decay_after_epoch`.
    pub decay_factor: f64,
}

impl LearningRateSchedule {
    /// Default epoch after which the rate decays.
    pub const DEFAULT_DECAY_AFTER_EPOCH: usize = 400;
    /// Default decay multiplier.
    pub const DEFAULT_DECAY_FACTOR: f64 = 0.1;

    /// Create a schedule with the default decay point and factor.
    pub fn new(base_lr: f64) -> Self {
        Self {
            base_lr,
            decay_after_epoch: Self::DEFAULT_DECAY_AFTER_EPOCH,
            decay_factor: Self::DEFAULT_DECAY_FACTOR,
        }
    }

    /// Set the last epoch trained at the base rate.
    pub fn with_decay_after_epoch(mut self, epoch: usize) -> Self {
        self.decay_after_epoch = epoch;
        self
    }

    /// Set the decay multiplier.
    pub fn with_decay_factor(mut self, factor: f64) -> Self {
        self.decay_factor = factor;
        self
    }

    /// Learning rate for a 1-based epoch.
    pub fn learning_rate(&self, epoch: usize) -> f64 {
        if epoch <= self.decay_after_epoch {
            self.base_lr
        } else {
            self.base_lr * self.decay_factor
        }
    }
}
