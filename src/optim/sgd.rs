//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::model::Param;
use ndarray::Array2;

/// SGD with momentum, optional Nesterov acceleration, and L2 weight decay
///
/// Update rule (per parameter):
///
/// ```text
/// g = grad + weight_decay * value
/// v = momentum * v + g
/// value -= lr * (g + momentum * v)   (Nesterov)
/// value -= lr * v                    (plain momentum)
/// ```
pub struct Sgd {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    nesterov: bool,
    velocities: Vec<Option<Array2<f32>>>,
}

impl Sgd {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32, weight_decay: f32, nesterov: bool) -> Self {
        Self { lr, momentum, weight_decay, nesterov, velocities: Vec::new() }
    }

    /// Plain SGD without momentum or weight decay
    pub fn plain(lr: f32) -> Self {
        Self::new(lr, 0.0, 0.0, false)
    }

    /// Initialize velocities if needed
    fn ensure_velocities(&mut self, n: usize) {
        if self.velocities.len() != n {
            self.velocities = (0..n).map(|_| None).collect();
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.ensure_velocities(params.len());

        for (i, param) in params.iter_mut().enumerate() {
            let mut g = param.grad.clone();
            if self.weight_decay > 0.0 {
                g += &(&param.value * self.weight_decay);
            }

            if self.momentum > 0.0 {
                let velocity = match self.velocities[i].take() {
                    Some(v) => v * self.momentum + &g,
                    None => g.clone(),
                };
                if self.nesterov {
                    g += &(&velocity * self.momentum);
                } else {
                    g = velocity.clone();
                }
                self.velocities[i] = Some(velocity);
            }

            param.value -= &(&g * self.lr);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
