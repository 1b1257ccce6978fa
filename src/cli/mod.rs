//! CLI command handlers
//!
//! Drives the example models through the lifecycle contract from the
//! command line:
//!
//! ```bash
//! # Print a model's knob declaration as JSON
//! afinar knobs softmax
//!
//! # Train with baseline knobs (plus overrides) and save parameters
//! afinar train softmax --dataset train.csv --params-dir out --knob max_trial_epochs=20
//!
//! # Evaluate saved parameters on a dataset
//! afinar evaluate softmax --dataset val.csv --params-dir out
//!
//! # Predict class probabilities for query pixel rows
//! afinar predict softmax --params-dir out --queries queries.csv
//!
//! # Full lifecycle check of a model definition
//! afinar check mlp --train train.csv --val val.csv --params-dir out
//! ```

use crate::dataset;
use crate::dev;
use crate::knob::{KnobSet, KnobValue};
use crate::logger::Logger;
use crate::model::TunableModel;
use crate::models::{MlpImage, SoftmaxImage};
use crate::params::ParamMap;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Afinar: model tuning SDK
#[derive(Parser, Debug)]
#[command(name = "afinar")]
#[command(version)]
#[command(about = "Knob declaration, training-loop orchestration, and parameter sharing for image classifiers")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a model's knob configuration as JSON
    Knobs {
        /// Model definition
        model: ModelKind,
    },

    /// Train a model and save its parameters
    Train {
        /// Model definition
        model: ModelKind,

        /// Path to the training dataset CSV
        #[arg(long)]
        dataset: String,

        /// Directory to write parameters into
        #[arg(long)]
        params_dir: PathBuf,

        /// Knob override as name=value (repeatable)
        #[arg(long = "knob", value_name = "NAME=VALUE")]
        knobs: Vec<String>,
    },

    /// Evaluate saved parameters on a dataset
    Evaluate {
        /// Model definition
        model: ModelKind,

        /// Path to the evaluation dataset CSV
        #[arg(long)]
        dataset: String,

        /// Directory holding saved parameters
        #[arg(long)]
        params_dir: PathBuf,

        /// Knob override as name=value (repeatable)
        #[arg(long = "knob", value_name = "NAME=VALUE")]
        knobs: Vec<String>,
    },

    /// Predict class probabilities for query pixel rows
    Predict {
        /// Model definition
        model: ModelKind,

        /// Directory holding saved parameters
        #[arg(long)]
        params_dir: PathBuf,

        /// CSV of query pixel rows (no label column)
        #[arg(long)]
        queries: PathBuf,

        /// Knob override as name=value (repeatable)
        #[arg(long = "knob", value_name = "NAME=VALUE")]
        knobs: Vec<String>,
    },

    /// Run a model definition through its full lifecycle once
    Check {
        /// Model definition
        model: ModelKind,

        /// Path to the training dataset CSV
        #[arg(long)]
        train: String,

        /// Path to the validation dataset CSV
        #[arg(long)]
        val: String,

        /// Scratch directory for the save/reload leg
        #[arg(long)]
        params_dir: PathBuf,
    },
}

/// The bundled example model definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Linear softmax classifier
    Softmax,
    /// One-hidden-layer MLP classifier
    Mlp,
}

/// Execute a parsed command
pub fn run_command(cli: Cli) -> crate::Result<()> {
    let logger = if cli.quiet { Logger::null() } else { Logger::console() };
    match cli.command {
        Command::Knobs { model } => {
            let json = match model {
                ModelKind::Softmax => SoftmaxImage::knob_config().to_json(),
                ModelKind::Mlp => MlpImage::knob_config().to_json(),
            };
            println!("{json}");
            Ok(())
        }
        Command::Train { model, dataset, params_dir, knobs } => match model {
            ModelKind::Softmax => cmd_train::<SoftmaxImage>(&dataset, &params_dir, &knobs, logger),
            ModelKind::Mlp => cmd_train::<MlpImage>(&dataset, &params_dir, &knobs, logger),
        },
        Command::Evaluate { model, dataset, params_dir, knobs } => match model {
            ModelKind::Softmax => {
                cmd_evaluate::<SoftmaxImage>(&dataset, &params_dir, &knobs, logger)
            }
            ModelKind::Mlp => cmd_evaluate::<MlpImage>(&dataset, &params_dir, &knobs, logger),
        },
        Command::Predict { model, params_dir, queries, knobs } => match model {
            ModelKind::Softmax => {
                cmd_predict::<SoftmaxImage>(&params_dir, &queries, &knobs, logger)
            }
            ModelKind::Mlp => cmd_predict::<MlpImage>(&params_dir, &queries, &knobs, logger),
        },
        Command::Check { model, train, val, params_dir } => {
            let report = match model {
                ModelKind::Softmax => {
                    dev::check_model::<SoftmaxImage>(&train, &val, &[], &params_dir, logger)?
                }
                ModelKind::Mlp => {
                    dev::check_model::<MlpImage>(&train, &val, &[], &params_dir, logger)?
                }
            };
            println!("accuracy: {:.4}", report.accuracy);
            println!("reloaded accuracy: {:.4}", report.reload_accuracy);
            Ok(())
        }
    }
}

fn cmd_train<M: TunableModel>(
    dataset: &str,
    params_dir: &std::path::Path,
    overrides: &[String],
    logger: Logger,
) -> crate::Result<()> {
    let knobs = resolve_knobs::<M>(overrides)?;
    let mut model = M::build(knobs, logger)?;
    model.train(dataset, &ParamMap::new())?;
    model.save_parameters(params_dir)?;
    println!("Parameters saved to {}", params_dir.display());
    Ok(())
}

fn cmd_evaluate<M: TunableModel>(
    dataset: &str,
    params_dir: &std::path::Path,
    overrides: &[String],
    logger: Logger,
) -> crate::Result<()> {
    let knobs = resolve_knobs::<M>(overrides)?;
    let mut model = M::build(knobs, logger)?;
    model.load_parameters(params_dir)?;
    let accuracy = model.evaluate(dataset)?;
    println!("accuracy: {accuracy:.4}");
    Ok(())
}

fn cmd_predict<M: TunableModel>(
    params_dir: &std::path::Path,
    queries: &std::path::Path,
    overrides: &[String],
    logger: Logger,
) -> crate::Result<()> {
    let knobs = resolve_knobs::<M>(overrides)?;
    let mut model = M::build(knobs, logger)?;
    model.load_parameters(params_dir)?;

    let queries = dataset::load_queries(queries)?;
    let probs = model.predict(&queries)?;
    println!("{}", serde_json::to_string(&probs).unwrap_or_else(|_| "[]".to_string()));
    Ok(())
}

/// Baseline knobs plus `name=value` overrides from the command line
fn resolve_knobs<M: TunableModel>(overrides: &[String]) -> crate::Result<KnobSet> {
    let mut knobs = M::knob_config().baseline();
    for spec in overrides {
        let (name, value) = parse_override(spec)?;
        knobs.set(&name, value);
    }
    Ok(knobs)
}

fn parse_override(spec: &str) -> crate::Result<(String, KnobValue)> {
    let (name, raw) = spec
        .split_once('=')
        .ok_or_else(|| crate::Error::Config(format!("invalid knob override '{spec}', expected name=value")))?;

    let value = if let Ok(i) = raw.parse::<i64>() {
        KnobValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        KnobValue::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        KnobValue::Bool(b)
    } else {
        KnobValue::Str(raw.to_string())
    };
    Ok((name.to_string(), value))
}
