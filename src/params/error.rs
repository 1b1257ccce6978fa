//! Parameter serialization error types

use thiserror::Error;

/// Errors from saving, loading, or decoding model parameters
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Missing parameters file: {0}")]
    MissingFile(String),

    #[error("Failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: String, source: std::io::Error },

    #[error("Corrupt parameters in {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Missing preprocessing metadata (train_params)")]
    MissingTrainParams,

    #[error("Invalid parameter blob: {0}")]
    InvalidBlob(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, ParamsError>;
