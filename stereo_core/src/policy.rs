//! Checkpoint selection: when to write a snapshot and which score is best.

/// Decides whether an epoch's snapshot is written.
///
/// A snapshot is written when the validation score improved, or on every
/// `interval`-th epoch regardless of the score. Both can hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    /// Unconditional save interval in epochs (0 disables periodic saves).
    pub interval: usize,
}

impl SavePolicy {
    /// Default unconditional save interval.
    pub const DEFAULT_INTERVAL: usize = 10;

    /// Create a policy with the given periodic interval.
    pub fn new(interval: usize) -> Self {
        Self { interval }
    }

    /// Whether a snapshot must be written for `epoch`.
    pub fn should_save(&self, epoch: usize, is_best: bool) -> bool {
        is_best || self.is_periodic(epoch)
    }

    /// Whether `epoch` falls on the periodic interval.
    pub fn is_periodic(&self, epoch: usize) -> bool {
        self.interval > 0 && epoch % self.interval == 0
    }
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

/// Tracks the lowest validation score seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestScoreTracker {
    best: Option<f64>,
}

impl BestScoreTracker {
    /// Create a tracker with no score recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Best score so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Record an epoch score; returns `true` if it is a new minimum.
    ///
    /// `None` (nothing validated) and NaN scores never improve.
    pub fn observe(&mut self, score: Option<f64>) -> bool {
        let Some(score) = score else {
            return false;
        };
        if score.is_nan() {
            return false;
        }
        match self.best {
            Some(best) if score >= best => false,
            _ => {
                self.best = Some(score);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_save_without_improvement() {
        let policy = SavePolicy::default();
        assert!(policy.should_save(10, false));
        assert!(policy.should_save(20, false));
        assert!(!policy.should_save(7, false));
    }

    #[test]
    fn test_improvement_always_saves() {
        let policy = SavePolicy::default();
        assert!(policy.should_save(7, true));
    }

    #[test]
    fn test_zero_interval_disables_periodic() {
        let policy = SavePolicy::new(0);
        assert!(!policy.should_save(10, false));
        assert!(policy.should_save(10, true));
    }

    #[test]
    fn test_best_tracker() {
        let mut tracker = BestScoreTracker::new();
        assert!(tracker.observe(Some(0.5)));
        assert!(!tracker.observe(Some(0.5)));
        assert!(!tracker.observe(Some(0.7)));
        assert!(tracker.observe(Some(0.2)));
        assert_eq!(tracker.best(), Some(0.2));
    }

    #[test]
    fn test_best_tracker_ignores_missing_and_nan() {
        let mut tracker = BestScoreTracker::new();
        assert!(!tracker.observe(None));
        assert!(!tracker.observe(Some(f64::NAN)));
        assert_eq!(tracker.best(), None);
    }
}
