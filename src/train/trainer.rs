//! Epoch loop orchestration

use crate::dataset::{ImageDataset, TrainParams};
use crate::logger::Logger;
use crate::model::Network;
use crate::optim::{LrScheduler, Optimizer};
use crate::stats::{Direction, EarlyStopCondition, RunningAverage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Bounds and policy for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSettings {
    /// Maximum number of epochs
    pub max_epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Early-stop patience in epochs (negative disables)
    pub early_stop_patience: i32,
    /// Seed for batch shuffling (fresh entropy when absent)
    pub seed: Option<u64>,
}

impl FitSettings {
    /// Create settings with early stopping disabled
    pub fn new(max_epochs: usize, batch_size: usize) -> Self {
        Self { max_epochs, batch_size, early_stop_patience: -1, seed: None }
    }

    /// Enable early stopping with the given patience
    pub fn with_early_stop_patience(mut self, patience: i32) -> Self {
        self.early_stop_patience = patience;
        self
    }

    /// Fix the shuffling seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainReport {
    /// Epochs actually run (including the one that triggered a stop)
    pub epochs_run: usize,
    /// Global optimizer steps taken across the run
    pub steps: u64,
    /// Final epoch's mean training loss
    pub train_loss: f64,
    /// Final epoch's mean training accuracy
    pub train_acc: f64,
    /// Final epoch's mean validation loss, if a split was configured
    pub val_loss: Option<f64>,
    /// Final epoch's mean validation accuracy, if a split was configured
    pub val_acc: Option<f64>,
    /// Whether the early-stop condition ended the run
    pub stopped_early: bool,
}

/// Orchestrates the epoch loop over a [`Network`]
///
/// Owns the optimizer, schedule, and logger handle. Parameter tensors stay
/// inside the network; the trainer only borrows them for optimizer steps.
pub struct Trainer {
    optimizer: Box<dyn Optimizer>,
    scheduler: Box<dyn LrScheduler>,
    settings: FitSettings,
    logger: Logger,
    rng: StdRng,
    global_step: u64,
}

impl Trainer {
    /// Create a trainer
    pub fn new(
        optimizer: Box<dyn Optimizer>,
        scheduler: Box<dyn LrScheduler>,
        settings: FitSettings,
        logger: Logger,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { optimizer, scheduler, settings, logger, rng, global_step: 0 }
    }

    /// Resume the global step counter (e.g. from shared parameters)
    pub fn with_step(mut self, step: u64) -> Self {
        self.global_step = step;
        self
    }

    /// Global optimizer steps taken so far
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Run the epoch loop
    ///
    /// Trains on `train`, validating on `val` after every epoch when it is
    /// non-empty. Validation feeds the early-stop check; a stop signal
    /// breaks the loop immediately. Mutates the network's parameters on
    /// every training batch.
    pub fn fit<N: Network>(
        &mut self,
        net: &mut N,
        train: &ImageDataset,
        val: &ImageDataset,
        norm: &TrainParams,
    ) -> TrainReport {
        self.logger.define_plot("Losses over epochs", &["train_loss", "val_loss"], "epoch");
        self.logger.define_plot("Accuracies over epochs", &["train_acc", "val_acc"], "epoch");
        self.logger.log("Training model...");

        let mut early_stop =
            EarlyStopCondition::new(self.settings.early_stop_patience, Direction::Minimize);
        let mut report = TrainReport::default();

        for epoch in 0..self.settings.max_epochs {
            self.logger.log(format!("Running epoch {epoch}..."));
            report.epochs_run = epoch + 1;

            self.scheduler.step();
            self.scheduler.apply(self.optimizer.as_mut());

            let mut train_loss = RunningAverage::new();
            let mut train_acc = RunningAverage::new();
            for batch in train.shuffled_batches(self.settings.batch_size, norm, &mut self.rng) {
                let stats = net.train_batch(&batch);
                self.global_step += 1;
                self.optimizer.step(&mut net.params_mut());

                train_loss.add(stats.loss);
                train_acc.add(stats.accuracy);
            }

            self.logger.metrics(&[
                ("epoch", epoch as f64),
                ("step", self.global_step as f64),
                ("train_loss", train_loss.get()),
                ("train_acc", train_acc.get()),
            ]);
            report.train_loss = train_loss.get();
            report.train_acc = train_acc.get();

            if !val.is_empty() {
                let mut val_loss = RunningAverage::new();
                let mut val_acc = RunningAverage::new();
                for batch in val.batches(self.settings.batch_size, norm) {
                    let stats = net.eval_batch(&batch);
                    val_loss.add(stats.loss);
                    val_acc.add(stats.accuracy);
                }

                self.logger.metrics(&[
                    ("epoch", epoch as f64),
                    ("val_loss", val_loss.get()),
                    ("val_acc", val_acc.get()),
                ]);
                report.val_loss = Some(val_loss.get());
                report.val_acc = Some(val_acc.get());

                if early_stop.check(val_loss.get()) {
                    self.logger.log(format!(
                        "Validation loss has not improved for {} epochs",
                        early_stop.patience()
                    ));
                    self.logger.log("Early stopping...");
                    report.stopped_early = true;
                    break;
                }
            }
        }

        report.steps = self.global_step;
        report
    }
}
