//! Adam optimizer

use super::Optimizer;
use crate::model::Param;
use ndarray::Array2;

/// Adam optimizer with bias-corrected moment estimates
///
/// ```text
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// value -= lr * m_hat / (sqrt(v_hat) + epsilon)
/// ```
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array2<f32>>>,
    v: Vec<Option<Array2<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, m: Vec::new(), v: Vec::new() }
    }

    /// Adam with the usual defaults
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Initialize moments if needed
    fn ensure_moments(&mut self, n: usize) {
        if self.m.len() != n {
            self.m = (0..n).map(|_| None).collect();
            self.v = (0..n).map(|_| None).collect();
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Param]) {
        self.ensure_moments(params.len());
        self.t += 1;

        let bc1 = 1.0 - self.beta1.powi(self.t as i32);
        let bc2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, param) in params.iter_mut().enumerate() {
            let g = &param.grad;

            let m = match self.m[i].take() {
                Some(m) => m * self.beta1 + &(g * (1.0 - self.beta1)),
                None => g * (1.0 - self.beta1),
            };
            let v = match self.v[i].take() {
                Some(v) => v * self.beta2 + &(g.mapv(|x| x * x) * (1.0 - self.beta2)),
                None => g.mapv(|x| x * x) * (1.0 - self.beta2),
            };

            let m_hat = &m / bc1;
            let v_hat = &v / bc2;
            let update = m_hat / (v_hat.mapv(f32::sqrt) + self.epsilon);
            param.value -= &(update * self.lr);

            self.m[i] = Some(m);
            self.v[i] = Some(v);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
