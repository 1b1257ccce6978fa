//! Incremental mean over a scalar stream

/// Incrementally-updated mean of a scalar stream
///
/// Each `add` folds one observation into the mean without storing the
/// stream. The count never decreases.
///
/// # Example
///
/// ```
/// use afinar::stats::RunningAverage;
///
/// let mut avg = RunningAverage::new();
/// avg.add(2.0);
/// avg.add(4.0);
/// assert_eq!(avg.get(), 3.0);
/// assert_eq!(avg.count(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningAverage {
    avg: f64,
    count: u64,
}

impl RunningAverage {
    /// Create an empty average
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the mean
    pub fn add(&mut self, value: f64) {
        let n = self.count as f64;
        self.avg = self.avg * n / (n + 1.0) + value / (n + 1.0);
        self.count += 1;
    }

    /// Current mean (0.0 before any observation)
    pub fn get(&self) -> f64 {
        self.avg
    }

    /// Number of observations folded in so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Check if no observations were added
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
