//! Afinar: model tuning SDK
//!
//! The client-side glue a model definition needs to plug into a
//! hyperparameter-tuning platform:
//!
//! - **Knobs** ([`knob`]) - declare tunable hyperparameters and their
//!   domains; the external orchestrator samples values and passes them
//!   back.
//! - **Datasets** ([`dataset`]) - load labeled images from a URI with
//!   inferred dimensions and class count, plus the preprocessing metadata
//!   ([`dataset::TrainParams`]) that must travel with trained weights.
//! - **Training loop** ([`train`]) - epoch orchestration with learning-rate
//!   schedules, running averages, and early stopping ([`stats`], [`optim`]).
//! - **Parameters** ([`params`]) - save/load directories, in-memory blobs,
//!   and the flat name-to-tensor map shared across tuning trials.
//! - **Lifecycle contract** ([`model`]) - the [`model::TunableModel`] trait
//!   every definition implements; [`models`] ships two reference
//!   implementations.
//!
//! # Example
//!
//! ```no_run
//! use afinar::model::TunableModel;
//! use afinar::models::SoftmaxImage;
//! use afinar::logger::Logger;
//! use afinar::params::ParamMap;
//!
//! # fn main() -> afinar::Result<()> {
//! let knobs = SoftmaxImage::knob_config().baseline();
//! let mut model = SoftmaxImage::build(knobs, Logger::console())?;
//! model.train("data/train.csv", &ParamMap::new())?;
//! let accuracy = model.evaluate("data/val.csv")?;
//! model.save_parameters("params".as_ref())?;
//! println!("accuracy: {accuracy:.4}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod dataset;
pub mod dev;
pub mod error;
pub mod knob;
pub mod logger;
pub mod model;
pub mod models;
pub mod optim;
pub mod params;
pub mod stats;
pub mod train;

pub use dataset::{ImageDataset, TrainParams};
pub use error::{Error, Result};
pub use knob::{Knob, KnobConfig, KnobSet, KnobValue};
pub use logger::Logger;
pub use model::{Network, Param, SharedParamsPolicy, StepStats, TrialPlan, TunableModel};
pub use params::ParamMap;
pub use stats::{Direction, EarlyStopCondition, RunningAverage, TimedRepeatCondition};
pub use train::{Batch, FitSettings, TrainReport, Trainer};
