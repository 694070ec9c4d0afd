//! Error types for the density feature pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DensityError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum DensityError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Missing required column '{column}' in {partition} partition")]
    MissingColumn { column: String, partition: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Periods not strictly increasing for cfips {cfips}: {previous} followed by {current}")]
    NonMonotonicPeriod {
        cfips: i64,
        previous: String,
        current: String,
    },

    #[error("Period gap for cfips {cfips}: {previous} followed by {current}")]
    PeriodGap {
        cfips: i64,
        previous: String,
        current: String,
    },

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Non-finite value {value} in column '{column}' (cfips {cfips}, dcount {dcount})")]
    NonFiniteValue {
        column: String,
        cfips: i64,
        dcount: usize,
        value: f64,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for DensityError {
    fn from(err: polars::error::PolarsError) -> Self {
        DensityError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DensityError {
    fn from(err: serde_json::Error) -> Self {
        DensityError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DensityError {
    fn from(err: ndarray::ShapeError) -> Self {
        DensityError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DensityError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_missing_column_display() {
        let err = DensityError::MissingColumn {
            column: "cfips".to_string(),
            partition: "train".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required column 'cfips' in train partition");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DensityError = io_err.into();
        assert!(matches!(err, DensityError::IoError(_)));
    }
}
