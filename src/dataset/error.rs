//! Dataset error types

use thiserror::Error;

/// Dataset loading and validation errors
///
/// All of these are fatal: the caller (the tuning orchestrator) decides
/// whether to retry the trial.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Dataset {path}, row {row}: {reason}")]
    Malformed { path: String, row: usize, reason: String },

    #[error("Dataset {0} has no samples")]
    Empty(String),

    #[error("Row width {0} is not a square RGB image (expected side*side*3 values)")]
    NotImage(usize),
}

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;
