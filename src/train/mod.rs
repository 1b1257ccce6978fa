//! Training loop orchestration
//!
//! [`Trainer::fit`] runs the epoch loop for a [`Network`](crate::model::Network):
//! advance the learning-rate schedule, sweep shuffled mini-batches with one
//! optimizer step each, track running averages, validate on the held-out
//! split without touching parameters, and stop early when the validation
//! loss plateaus. All tensor math stays behind the network; this layer only
//! sequences it.
//!
//! # Example
//!
//! ```no_run
//! use afinar::train::{FitSettings, Trainer};
//! use afinar::optim::{MultiStepLr, Sgd};
//! use afinar::logger::Logger;
//! # let (net, train_ds, val_ds, train_params): (afinar::models::SoftmaxNet, afinar::dataset::ImageDataset, afinar::dataset::ImageDataset, afinar::dataset::TrainParams) = todo!();
//! # let mut net = net;
//!
//! let settings = FitSettings::new(200, 32).with_early_stop_patience(5);
//! let mut trainer = Trainer::new(
//!     Box::new(Sgd::new(0.01, 0.9, 1e-4, true)),
//!     Box::new(MultiStepLr::for_trial(0.01, 0.01, 200)),
//!     settings,
//!     Logger::console(),
//! );
//! let report = trainer.fit(&mut net, &train_ds, &val_ds, &train_params);
//! println!("stopped early: {}", report.stopped_early);
//! ```

mod batch;
mod trainer;

pub use batch::Batch;
pub use trainer::{FitSettings, TrainReport, Trainer};
