//! Error types for the cardiofit pipeline

use thiserror::Error;

/// Result type alias for cardiofit operations
pub type Result<T> = std::result::Result<T, CardioError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum CardioError {
    /// Input could not be parsed, names collide, or no target column resolves
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A declared feature is missing or not numeric after cleaning
    #[error("Feature error: {0}")]
    FeatureError(String),

    /// Too few rows or classes left to split, fit or evaluate
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The fitted pipeline cannot be lowered to the portable graph
    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl CardioError {
    /// Name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            CardioError::SchemaError(_)
            | CardioError::FeatureError(_)
            | CardioError::DataError(_) => "load",
            CardioError::InsufficientData(_)
            | CardioError::TrainingError(_)
            | CardioError::ShapeError { .. }
            | CardioError::ModelNotFitted => "train",
            CardioError::ExportError(_) | CardioError::SerializationError(_) => "export",
            CardioError::ConfigError(_) | CardioError::InvalidParameter { .. } => "config",
            CardioError::IoError(_) => "io",
        }
    }
}

impl From<polars::error::PolarsError> for CardioError {
    fn from(err: polars::error::PolarsError) -> Self {
        CardioError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CardioError {
    fn from(err: serde_json::Error) -> Self {
        CardioError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CardioError {
    fn from(err: bincode::Error) -> Self {
        CardioError::SerializationError(err.to_string())
    }
}

impl From<prost::DecodeError> for CardioError {
    fn from(err: prost::DecodeError) -> Self {
        CardioError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CardioError {
    fn from(err: ndarray::ShapeError) -> Self {
        CardioError::ShapeError {
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
        let err = CardioError::FeatureError("missing thal".to_string());
        assert_eq!(err.to_string(), "Feature error: missing thal");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CardioError = io_err.into();
        assert!(matches!(err, CardioError::IoError(_)));
        assert_eq!(err.stage(), "io");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(CardioError::SchemaError(String::new()).stage(), "load");
        assert_eq!(CardioError::InsufficientData(String::new()).stage(), "train");
        assert_eq!(CardioError::ExportError(String::new()).stage(), "export");
    }
}
