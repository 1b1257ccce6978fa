//! Learning rate schedulers

use super::Optimizer;

/// Learning rate scheduler trait
///
/// The trainer calls `step` once per epoch and then `apply` to push the
/// current rate into the optimizer.
pub trait LrScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Advance the schedule by one epoch
    fn step(&mut self);

    /// Apply the current learning rate to an optimizer
    fn apply(&self, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}

/// Milestone decay: multiply the base rate by `gamma` at each milestone
///
/// With milestones at 50% and 75% of the trial epochs this reproduces the
/// schedule the image classifiers train with.
pub struct MultiStepLr {
    base_lr: f32,
    gamma: f32,
    milestones: Vec<usize>,
    epochs_stepped: usize,
}

impl MultiStepLr {
    /// Create a scheduler with explicit milestone epochs (1-based)
    pub fn new(base_lr: f32, gamma: f32, mut milestones: Vec<usize>) -> Self {
        milestones.sort_unstable();
        milestones.dedup();
        Self { base_lr, gamma, milestones, epochs_stepped: 0 }
    }

    /// Milestones at half and three-quarters of the trial epochs
    pub fn for_trial(base_lr: f32, gamma: f32, trial_epochs: usize) -> Self {
        let half = (trial_epochs / 2).max(1);
        let three_quarters = (trial_epochs * 3 / 4).max(1);
        Self::new(base_lr, gamma, vec![half, three_quarters])
    }

    /// Milestone epochs (sorted, deduplicated)
    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }
}

impl LrScheduler for MultiStepLr {
    fn get_lr(&self) -> f32 {
        let passed = self.milestones.iter().filter(|&&m| self.epochs_stepped >= m).count();
        self.base_lr * self.gamma.powi(passed as i32)
    }

    fn step(&mut self) {
        self.epochs_stepped += 1;
    }
}

/// Constant learning rate
pub struct ConstantLr {
    lr: f32,
}

impl ConstantLr {
    /// Create a constant schedule
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl LrScheduler for ConstantLr {
    fn get_lr(&self) -> f32 {
        self.lr
    }

    fn step(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_multi_step_decay_points() {
        let mut sched = MultiStepLr::new(1.0, 0.1, vec![2, 4]);

        sched.step(); // epoch 1
        assert_abs_diff_eq!(sched.get_lr(), 1.0);
        sched.step(); // epoch 2: first milestone
        assert_abs_diff_eq!(sched.get_lr(), 0.1);
        sched.step(); // epoch 3
        assert_abs_diff_eq!(sched.get_lr(), 0.1);
        sched.step(); // epoch 4: second milestone
        assert_abs_diff_eq!(sched.get_lr(), 0.01, epsilon = 1e-9);
        sched.step();
        assert_abs_diff_eq!(sched.get_lr(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_for_trial_milestones() {
        let sched = MultiStepLr::for_trial(0.1, 0.5, 200);
        assert_eq!(sched.milestones(), &[100, 150]);

        // Degenerate short trials still get valid milestones
        let sched = MultiStepLr::for_trial(0.1, 0.5, 1);
        assert_eq!(sched.milestones(), &[1]);
    }

    #[test]
    fn test_apply_sets_optimizer_lr() {
        let mut sched = MultiStepLr::new(1.0, 0.1, vec![1]);
        let mut opt = Sgd::plain(1.0);

        sched.step();
        sched.apply(&mut opt);
        assert_abs_diff_eq!(opt.lr(), 0.1);
    }

    #[test]
    fn test_constant_lr() {
        let mut sched = ConstantLr::new(0.01);
        sched.step();
        sched.step();
        assert_eq!(sched.get_lr(), 0.01);
    }

    #[test]
    fn test_duplicate_milestones_collapse() {
        let mut sched = MultiStepLr::new(1.0, 0.1, vec![1, 1]);
        sched.step();
        assert_abs_diff_eq!(sched.get_lr(), 0.1);
    }
}
