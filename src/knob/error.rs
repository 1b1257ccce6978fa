//! Knob error types

use thiserror::Error;

/// Knob declaration and resolution errors
#[derive(Debug, Error)]
pub enum KnobError {
    #[error("Unknown knob: {0}")]
    Unknown(String),

    #[error("Missing knob: {0}")]
    Missing(String),

    #[error("Invalid value for knob {0}: {1}")]
    InvalidValue(String, String),

    #[error("Knob {0} is not a {1}")]
    WrongType(String, &'static str),
}

/// Result type for knob operations
pub type Result<T> = std::result::Result<T, KnobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knob_error_display() {
        let err = KnobError::Unknown("dropout".to_string());
        assert!(format!("{err}").contains("Unknown knob"));

        let err = KnobError::Missing("lr".to_string());
        assert!(format!("{err}").contains("Missing knob"));
        assert!(format!("{err}").contains("lr"));

        let err = KnobError::InvalidValue("lr".to_string(), "2.0".to_string());
        assert!(format!("{err}").contains("Invalid value"));

        let err = KnobError::WrongType("batch_size".to_string(), "float");
        assert!(format!("{err}").contains("not a float"));
    }
}
