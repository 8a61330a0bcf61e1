//! Custom error types for the preprocessing crate.
//!
//! The preprocessor itself degrades gracefully on messy data (all-null
//! columns, zero variance, unsupported types), so these errors are reserved
//! for genuinely unusable input and for failures bubbling up from Polars.
//!
//! Errors serialize as `{code, message}` so that an HTTP layer can map them
//! to user-facing responses without string matching.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for preprocessing operations.
#[derive(Error, Debug)]
pub enum PreprocessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Row index outside of the table.
    #[error("Row {row} is out of bounds for a table with {height} rows")]
    RowOutOfBounds { row: usize, height: usize },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input records could not be turned into a table.
    #[error("Invalid records: {0}")]
    InvalidRecords(String),

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocessingError>,
    },
}

impl PreprocessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that translate errors into responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::RowOutOfBounds { .. } => "ROW_OUT_OF_BOUNDS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidRecords(_) => "INVALID_RECORDS",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was caused by caller input rather than an internal failure.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::ColumnNotFound(_)
            | Self::RowOutOfBounds { .. }
            | Self::InvalidConfig(_)
            | Self::InvalidRecords(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for PreprocessingError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        PreprocessingError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PreprocessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PreprocessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, PreprocessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serde_json::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Json(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PreprocessingError::ColumnNotFound("score".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            PreprocessingError::RowOutOfBounds { row: 3, height: 2 }.error_code(),
            "ROW_OUT_OF_BOUNDS"
        );
    }

    #[test]
    fn test_with_context_keeps_code() {
        let err = PreprocessingError::InvalidRecords("row 2 is not an object".to_string())
            .with_context("loading upload");
        assert_eq!(err.error_code(), "INVALID_RECORDS");
        assert!(err.is_input_error());
        assert!(err.to_string().starts_with("loading upload: "));
    }

    #[test]
    fn test_serialize_error() {
        let err = PreprocessingError::ColumnNotFound("gpa".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "COLUMN_NOT_FOUND");
        assert_eq!(json["message"], "Column 'gpa' not found in dataset");
    }

    #[test]
    fn test_polars_error_is_not_input_error() {
        let err: PreprocessingError =
            polars::error::PolarsError::ComputeError("boom".into()).into();
        assert_eq!(err.error_code(), "POLARS_ERROR");
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(PreprocessingError::InvalidConfig("bad".to_string()));
        let err = result.context("building config").unwrap_err();
        assert!(matches!(err, PreprocessingError::WithContext { .. }));
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
