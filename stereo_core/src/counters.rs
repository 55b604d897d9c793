//! Global step counters used as x-axis indices for scalar metrics.

/// Monotonic train/validation step counters spanning the whole run.
///
/// Counters are never reset between epochs. Skipped batches do not advance them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounters {
    train: u64,
    val: u64,
}

impl StepCounters {
    /// Create counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed training steps.
    pub fn train(&self) -> u64 {
        self.train
    }

    /// Number of completed validation steps.
    pub fn val(&self) -> u64 {
        self.val
    }

    /// Advance the training counter and return the 1-based index of the step.
    pub fn next_train(&mut self) -> u64 {
        self.train += 1;
        self.train
    }

    /// Advance the validation counter and return the 1-based index of the step.
    pub fn next_val(&mut self) -> u64 {
        self.val += 1;
        self.val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent() {
        let mut counters = StepCounters::new();
        assert_eq!(counters.next_train(), 1);
        assert_eq!(counters.next_train(), 2);
        assert_eq!(counters.next_val(), 1);
        assert_eq!(counters.train(), 2);
        assert_eq!(counters.val(), 1);
    }
}
