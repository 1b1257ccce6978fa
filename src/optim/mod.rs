//! Optimizers and learning-rate schedules
//!
//! The training loop drives parameter updates through the [`Optimizer`]
//! trait; models never see the update rule. [`Sgd`] (momentum + Nesterov)
//! and [`Adam`] cover the example models; [`MultiStepLr`] reproduces the
//! milestone decay the image classifiers train with.

mod adam;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use scheduler::{ConstantLr, LrScheduler, MultiStepLr};
pub use sgd::Sgd;

use crate::model::Param;

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Apply one update step using the gradients in `params`
    fn step(&mut self, params: &mut [&mut Param]);

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Minimal optimizer for exercising the trait object surface
    struct TestOptimizer {
        learning_rate: f32,
    }

    impl Optimizer for TestOptimizer {
        fn step(&mut self, params: &mut [&mut Param]) {
            for param in params.iter_mut() {
                let update = &param.grad * self.learning_rate;
                param.value -= &update;
            }
        }

        fn lr(&self) -> f32 {
            self.learning_rate
        }

        fn set_lr(&mut self, lr: f32) {
            self.learning_rate = lr;
        }
    }

    #[test]
    fn test_optimizer_trait_object() {
        let mut param = Param::new("w", Array2::from_elem((1, 2), 1.0));
        param.grad.fill(0.5);

        let mut opt: Box<dyn Optimizer> = Box::new(TestOptimizer { learning_rate: 0.1 });
        opt.step(&mut [&mut param]);

        assert!((param.value[[0, 0]] - 0.95).abs() < 1e-6);
        assert_eq!(opt.lr(), 0.1);
        opt.set_lr(0.01);
        assert_eq!(opt.lr(), 0.01);
    }
}
