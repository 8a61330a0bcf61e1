//! gradecast-learning: model selection and grade prediction for student tables.
//!
//! This crate turns a raw grade table into a fitted regression model with
//! held-out metrics, feature importances and predictions. Preprocessing is
//! delegated to [`gradecast_processing`]; the models are native Rust built on
//! `ndarray`, with forests trained in parallel through `rayon`.
//!
//! # Features
//!
//! - **Target inference**: ordered keyword tiers, falling back to the last numeric column
//! - **Model Selection**: linear regression, ridge, random forest and gradient boosting,
//!   cross-validated and tuned one hyperparameter at a time
//! - **Single-entity prediction**: the latest row of a student, aligned to the trained features
//! - **Whole-table prediction**: previews plus calibration, band and error diagnostics
//! - **Progress Reporting**: stage and per-family callbacks, with cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gradecast_learning::{EntityQuery, Trainer, TrainingConfig};
//! use polars::prelude::*;
//!
//! let grades = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("grades.csv".into()))?
//!     .finish()?;
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::builder().test_size(0.25).build()?)
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build();
//!
//! let result = trainer.train_and_evaluate(&grades)?;
//! println!("{} predicts '{}' with R² {:.3}", result.best_model_name, result.target_column, result.metrics.r2);
//!
//! let query = EntityQuery::new("student_id", "1024").filter("course_id", "7");
//! let prediction = trainer.predict_for_entity(&grades, &query)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  raw DataFrame ──► Preprocessor ──► PreprocessedTable            │
//! │                                          │                       │
//! │                     TargetRules ──► target column                │
//! │                                          │                       │
//! │                    Dataset ──► train/test split                  │
//! │                                          │                       │
//! │        ModelSelector (k-fold CV, coordinate-wise grid sweep)     │
//! │                                          │                       │
//! │      held-out Metrics ◄── best model ──► refit on every row      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. The variants
//! that callers usually map to user-facing messages:
//!
//! - [`LearningError::UnknownTargetColumn`] - The configured target does not exist
//! - [`LearningError::NoTargetColumnFound`] - No target could be inferred
//! - [`LearningError::InsufficientData`] - Too few rows to cross-validate
//! - [`LearningError::EntityNotFound`] - No row matched the entity key
//! - [`LearningError::UnalignableFeatures`] - No feature survived preprocessing
//!
//! See [`LearningError`] for the complete list.
//!
//! # Thread Safety
//!
//! [`Trainer`] is `Send + Sync` and keeps no state between calls: every
//! operation preprocesses and retrains from the table it is given.

mod cancellation;
mod config;
pub mod cv;
mod dataset;
pub mod diagnostics;
mod entity;
mod error;
pub mod metrics;
pub mod models;
mod pipeline;
mod progress;
mod selector;
mod stats;
mod target;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{DEFAULT_TEST_SIZE, TrainingConfig, TrainingConfigBuilder};
pub use target::{KeywordTier, TargetRules};
// Cancellation token
pub use cancellation::CancellationToken;
// Error types
pub use error::{LearningError, Result};
// Feature matrix
pub use dataset::{Dataset, TrainTestSplit, train_test_indices};
// Entity lookup
pub use entity::{DEFAULT_ORDER_COLUMNS, EntityMatch, EntityQuery};
// Model selection
pub use models::{ModelFamily, ParamValue, Params, Regressor};
pub use selector::{FamilyResult, ModelSelector, Selection, get_feature_importance};
// Trainer types
pub use pipeline::{Trainer, TrainerBuilder};
// Progress reporting types
pub use progress::{ParseTrainingStageError, ProgressCallback, ProgressUpdate, TrainingStage};
// Result and metrics types
pub use metrics::Metrics;
pub use stats::{TargetSummary, summarize_target};
pub use types::{
    EntityPrediction, FeatureImportance, Predictions, TablePrediction, TrainingResult,
};
