//! Error types for the gradecast-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Distinguishable**: each condition that makes a meaningful result
//!   impossible has its own variant
//! - **Mappable**: [`LearningError::error_code`] gives a stable code that an
//!   HTTP layer can translate into a 4xx response
//!
//! Column-level anomalies (all-missing columns, zero variance, unencodable
//! values) never surface here; the preprocessor absorbs them.
//!
//! # Example
//!
//! ```no_run
//! use gradecast_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainingConfig::builder()
//!         .target_column("score")
//!         .build()?;
//!     Ok(config)
//! }
//! ```

use gradecast_processing::PreprocessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for gradecast-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the trainer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or prediction.
    ///
    /// Common causes:
    /// - The entity key column does not exist
    /// - The target column has no values after preprocessing
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The caller named a target column that is absent from the preprocessed table.
    ///
    /// Column names are case-sensitive.
    #[error("Target column '{0}' not found")]
    UnknownTargetColumn(String),

    /// No target column could be inferred: no keyword matched and the table
    /// has no numeric column.
    #[error("No target column could be inferred from the table")]
    NoTargetColumnFound,

    /// Too few rows for cross-validation.
    #[error("Insufficient data: {rows} rows, at least {required} required")]
    InsufficientData {
        /// Rows available after preprocessing.
        rows: usize,
        /// Minimum rows required.
        required: usize,
    },

    /// No row matched the requested entity key.
    #[error("No row with {column} = '{value}'")]
    EntityNotFound {
        /// The key column that was searched.
        column: String,
        /// The key value that was not found.
        value: String,
    },

    /// No usable feature survived preprocessing.
    #[error("Cannot build a feature set: {0}")]
    UnalignableFeatures(String),

    /// Every candidate model failed to fit.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Training was cancelled by the caller.
    #[error("Training cancelled")]
    Cancelled,

    /// Error raised by the preprocessor.
    #[error("Preprocessing error: {0}")]
    Preprocessing(#[from] PreprocessingError),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// I/O error while reading input files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Stable error code for callers that translate errors into responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::UnknownTargetColumn(_) => "UNKNOWN_TARGET_COLUMN",
            Self::NoTargetColumnFound => "NO_TARGET_COLUMN_FOUND",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            Self::UnalignableFeatures(_) => "UNALIGNABLE_FEATURES",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Preprocessing(err) => err.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error was caused by the caller's input (a 4xx at an HTTP boundary).
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidData(_)
            | Self::UnknownTargetColumn(_)
            | Self::NoTargetColumnFound
            | Self::InsufficientData { .. }
            | Self::EntityNotFound { .. }
            | Self::UnalignableFeatures(_) => true,
            Self::Preprocessing(err) => err.is_input_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;
