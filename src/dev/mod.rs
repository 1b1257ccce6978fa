//! Model development harness
//!
//! [`check_model`] drives a model implementation through its full lifecycle
//! once - train, evaluate, save, reload into a fresh instance, re-evaluate,
//! predict - so an author can validate a definition before submitting it to
//! the tuning platform. Knobs resolve to their baseline values.

use crate::logger::Logger;
use crate::model::TunableModel;
use crate::params::ParamMap;
use std::path::Path;

/// Scores gathered by one lifecycle check
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// Accuracy of the trained instance on the validation dataset
    pub accuracy: f64,
    /// Accuracy of the reloaded instance on the same dataset
    pub reload_accuracy: f64,
    /// Class probabilities for the supplied queries, from the reloaded
    /// instance
    pub predictions: Vec<Vec<f32>>,
}

/// Run a model through its full lifecycle once
///
/// Trains on `train_uri` with baseline knobs, evaluates on `val_uri`,
/// saves parameters into `params_dir`, reloads them into a fresh instance,
/// re-evaluates, and predicts on `queries` (raw pixel rows; may be empty).
pub fn check_model<M: TunableModel>(
    train_uri: &str,
    val_uri: &str,
    queries: &[Vec<f32>],
    params_dir: &Path,
    logger: Logger,
) -> crate::Result<CheckReport> {
    let knobs = M::knob_config().baseline();

    logger.log("Checking model: train...");
    let mut model = M::build(knobs.clone(), logger.clone())?;
    model.train(train_uri, &ParamMap::new())?;

    logger.log("Checking model: evaluate...");
    let accuracy = model.evaluate(val_uri)?;

    logger.log("Checking model: save and reload...");
    model.save_parameters(params_dir)?;
    let mut restored = M::build(knobs, logger.clone())?;
    restored.load_parameters(params_dir)?;
    let reload_accuracy = restored.evaluate(val_uri)?;

    let predictions =
        if queries.is_empty() { Vec::new() } else { restored.predict(queries)? };

    logger.log(format!(
        "Check complete: accuracy={accuracy:.4}, reloaded={reload_accuracy:.4}"
    ));

    Ok(CheckReport { accuracy, reload_accuracy, predictions })
}
