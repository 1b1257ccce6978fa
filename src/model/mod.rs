//! Model lifecycle contract
//!
//! Every model definition implements [`TunableModel`]: declare knobs, train
//! against a dataset URI, evaluate, predict, and save/load parameters. The
//! external tuning orchestrator drives instances exclusively through this
//! contract, one trial per instance.
//!
//! The inner [`Network`] trait is the seam between the training loop and
//! the numeric model: the loop never sees layer math, only per-batch
//! loss/accuracy and the parameter list the optimizer updates.

mod trial;

pub use trial::{SharedParamsPolicy, TrialPlan};

use crate::knob::{KnobConfig, KnobSet};
use crate::logger::Logger;
use crate::params::ParamMap;
use crate::train::Batch;
use ndarray::Array2;
use std::path::Path;

/// A named weight tensor with its gradient buffer
///
/// Exclusively owned by the model instance for its lifetime; the training
/// loop mutates values through the optimizer, the model fills gradients
/// during its backward pass.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name, used as the serialization key
    pub name: String,
    /// Current weights
    pub value: Array2<f32>,
    /// Gradient of the last batch loss
    pub grad: Array2<f32>,
}

impl Param {
    /// Create a parameter from initial weights (gradient zeroed)
    pub fn new(name: impl Into<String>, value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self { name: name.into(), value, grad }
    }

    /// Create a zero-initialized parameter
    pub fn zeros(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::new(name, Array2::zeros((rows, cols)))
    }

    /// Number of scalar weights
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Check if the parameter is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Reset the gradient buffer to zero
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

/// Loss and accuracy of one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// Mean loss over the batch
    pub loss: f64,
    /// Fraction of correct predictions in the batch
    pub accuracy: f64,
}

/// The seam between the training loop and the numeric model
pub trait Network {
    /// Forward + backward on one batch: returns loss/accuracy and leaves
    /// gradients in the parameter buffers for the optimizer
    fn train_batch(&mut self, batch: &Batch) -> StepStats;

    /// Forward only; never touches parameters or gradients
    fn eval_batch(&self, batch: &Batch) -> StepStats;

    /// Class probabilities for normalized input rows
    fn predict_probs(&self, inputs: &Array2<f32>) -> Array2<f32>;

    /// Parameters in a stable order
    fn params(&self) -> Vec<&Param>;

    /// Mutable parameters in the same order
    fn params_mut(&mut self) -> Vec<&mut Param>;

    /// Total scalar weight count
    fn param_count(&self) -> usize {
        self.params().iter().map(|p| p.len()).sum()
    }
}

/// The lifecycle contract the tuning orchestrator drives
///
/// One instance corresponds to one trial. The orchestrator samples values
/// from [`TunableModel::knob_config`], builds the instance, trains it, and
/// may ask for shared parameters to seed later trials.
pub trait TunableModel: Sized {
    /// Declare the tunable hyperparameters and their domains
    fn knob_config() -> KnobConfig;

    /// Construct an instance for one trial from resolved knob values
    fn build(knobs: KnobSet, logger: Logger) -> crate::Result<Self>;

    /// Per-trial plan: knob overrides and parameter-sharing policy
    ///
    /// The default keeps the declared knobs and shares the locally best
    /// parameters during search trials, training the final trials from
    /// scratch.
    fn trial_plan(trial_no: usize, total_trials: usize) -> TrialPlan {
        TrialPlan::default_for(trial_no, total_trials)
    }

    /// Train on the dataset at `dataset_uri`, optionally seeding weights
    /// from a previous trial's shared parameters (empty map = none)
    fn train(&mut self, dataset_uri: &str, shared: &ParamMap) -> crate::Result<()>;

    /// Evaluate on a dataset, returning accuracy in [0, 1]
    fn evaluate(&mut self, dataset_uri: &str) -> crate::Result<f64>;

    /// Class probabilities for raw pixel-row queries
    fn predict(&self, queries: &[Vec<f32>]) -> crate::Result<Vec<Vec<f32>>>;

    /// Persist weights and preprocessing metadata into a directory
    fn save_parameters(&self, dir: &Path) -> crate::Result<()>;

    /// Restore weights and preprocessing metadata from a directory
    fn load_parameters(&mut self, dir: &Path) -> crate::Result<()>;

    /// Export parameters for sharing across trials, if the model opts in
    fn shared_parameters(&self) -> crate::Result<Option<ParamMap>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_zeros() {
        let p = Param::zeros("weight", 3, 4);
        assert_eq!(p.len(), 12);
        assert!(!p.is_empty());
        assert_eq!(p.value.shape(), &[3, 4]);
        assert_eq!(p.grad.shape(), &[3, 4]);
    }

    #[test]
    fn test_param_zero_grad() {
        let mut p = Param::zeros("bias", 1, 2);
        p.grad.fill(3.0);
        p.zero_grad();
        assert!(p.grad.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_param_new_keeps_values() {
        let value = Array2::from_elem((2, 2), 1.5);
        let p = Param::new("w", value);
        assert_eq!(p.value[[1, 1]], 1.5);
        assert_eq!(p.grad[[1, 1]], 0.0);
    }
}
