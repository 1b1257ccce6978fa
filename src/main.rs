//! Afinar CLI
//!
//! Command-line entry point for the model tuning SDK.
//!
//! # Usage
//!
//! ```bash
//! # Print a model's knob configuration
//! afinar knobs softmax
//!
//! # Train and save parameters
//! afinar train softmax --dataset train.csv --params-dir out
//!
//! # Evaluate saved parameters
//! afinar evaluate softmax --dataset val.csv --params-dir out
//!
//! # Full lifecycle check
//! afinar check mlp --train train.csv --val val.csv --params-dir out
//! ```

use afinar::cli::{run_command, Cli};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
