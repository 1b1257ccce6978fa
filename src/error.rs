//! Crate-level error type
//!
//! Aggregates module errors so lifecycle entry points (`train`, `evaluate`,
//! `save_parameters`, ...) return a single error type to the caller. No
//! retries happen at this layer; every failure propagates synchronously.

use thiserror::Error;

/// Top-level error for lifecycle operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("knob error: {0}")]
    Knob(#[from] crate::knob::KnobError),

    #[error("dataset error: {0}")]
    Dataset(#[from] crate::dataset::DatasetError),

    #[error("parameter error: {0}")]
    Params(#[from] crate::params::ParamsError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("batch_size must be positive".to_string());
        assert!(format!("{err}").contains("configuration error"));
        assert!(format!("{err}").contains("batch_size"));
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_knob() {
        let err: Error = crate::knob::KnobError::Missing("lr".to_string()).into();
        assert!(format!("{err}").contains("lr"));
    }
}
