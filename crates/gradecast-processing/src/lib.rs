//! Tabular Preprocessing Library
//!
//! Turns a raw, heterogeneous table of student records into a fully numeric
//! table ready for regression, built on Polars.
//!
//! # Overview
//!
//! [`Preprocessor::preprocess`] runs a fixed sequence of steps:
//!
//! - **Deduplication**: exact duplicate rows are removed, first occurrence kept
//! - **Datetime conversion**: dates and timestamps become days since 1970-01-01
//! - **Type unification**: integers, floats and booleans become `f64`
//! - **Imputation**: mean or median for continuous columns, mode otherwise
//! - **Outlier handling**: IQR or z-score outliers are replaced by the column mean
//! - **Label encoding**: text columns get integer codes in order of first occurrence
//!
//! The preprocessor degrades gracefully on messy data. Errors are reserved
//! for input that cannot be read at all.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gradecast_processing::{NumericImputation, OutlierStrategy, PreprocessConfig, Preprocessor};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("grades.csv".into()))?
//!     .finish()?;
//!
//! let config = PreprocessConfig::builder()
//!     .missing_strategy(NumericImputation::Median)
//!     .outlier_strategy(OutlierStrategy::ZScore)
//!     .build()?;
//!
//! let table = Preprocessor::new(config).preprocess(&df)?;
//! println!("{} rows, {} encoders", table.height(), table.encoders.len());
//! ```
//!
//! # Aligning Raw Rows
//!
//! A [`PreprocessedTable`] keeps the column roles and fitted encoders, so a
//! single raw row can be mapped into the same numeric space with
//! [`PreprocessedTable::encode_row`].

pub mod cleaner;
pub mod config;
pub mod encoding;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod records;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{
    ConfigValidationError, NumericImputation, OutlierStrategy, PreprocessConfig,
    PreprocessConfigBuilder,
};
pub use encoding::{EncoderMap, LabelEncoder};
pub use error::{PreprocessingError, Result as PreprocessingResult, ResultExt};
pub use imputers::StatisticalImputer;
pub use pipeline::{OutlierHandler, OutlierScan, Preprocessor, preprocess};
pub use records::{frame_from_json, records_to_frame};
pub use table::{PreprocessedTable, TableOverview};
pub use types::{
    ActionType, ColumnInfo, ColumnRole, ColumnSummary, PreprocessingAction, PreprocessingSummary,
};
