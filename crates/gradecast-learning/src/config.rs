//! Configuration types for the training pipeline.
//!
//! This module provides [`TrainingConfig`] and its builder.
//!
//! # Example
//!
//! ```
//! use gradecast_learning::TrainingConfig;
//!
//! let config = TrainingConfig::builder()
//!     .target_column("score")
//!     .cv_folds(5)
//!     .test_size(0.25)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::LearningError;
use crate::target::TargetRules;
use gradecast_processing::PreprocessConfig;
use serde::{Deserialize, Serialize};

/// Test fraction used when the configured one is outside `(0, 1)`.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Configuration for training and prediction.
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the
/// builder pattern. The configuration also deserializes from JSON, with every
/// field optional.
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainingConfigBuilder::build):
/// - `cv_folds` must be at least 2
/// - `min_rows` must be at least `cv_folds`
/// - `preview_limit` must be at least 1
/// - the preprocessing thresholds must be positive
///
/// `test_size` is never rejected; see [`TrainingConfig::effective_test_size`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Name of the target column.
    ///
    /// If `None`, the target is inferred with [`target_rules`](Self::target_rules).
    pub target_column: Option<String>,

    /// Fraction of rows held out for evaluation (default: 0.2).
    pub test_size: f64,

    /// Number of cross-validation folds (default: 5).
    pub cv_folds: usize,

    /// Seed for the train/test split and the forest bootstrap (default: 42).
    pub random_seed: u64,

    /// Minimum rows after preprocessing (default: 10).
    pub min_rows: usize,

    /// Maximum rows listed in whole-table prediction previews (default: 50).
    pub preview_limit: usize,

    /// Column whose raw value identifies a row in previews, e.g. `student_id`.
    pub id_column: Option<String>,

    /// Column used to group absolute errors in whole-table diagnostics,
    /// e.g. `class_id`.
    pub group_column: Option<String>,

    /// Preprocessing strategies and thresholds.
    pub preprocessing: PreprocessConfig,

    /// Keyword tiers used to infer the target column.
    pub target_rules: TargetRules,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: None,
            test_size: DEFAULT_TEST_SIZE,
            cv_folds: 5,
            random_seed: 42,
            min_rows: 10,
            preview_limit: 50,
            id_column: None,
            group_column: None,
            preprocessing: PreprocessConfig::default(),
            target_rules: TargetRules::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// The test fraction actually used for splitting.
    ///
    /// Values outside the open interval `(0, 1)`, and `NaN`, fall back to
    /// [`DEFAULT_TEST_SIZE`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gradecast_learning::TrainingConfig;
    ///
    /// let mut config = TrainingConfig::default();
    /// config.test_size = 1.5;
    /// assert_eq!(config.effective_test_size(), 0.2);
    /// ```
    #[must_use]
    pub fn effective_test_size(&self) -> f64 {
        if self.test_size > 0.0 && self.test_size < 1.0 {
            self.test_size
        } else {
            DEFAULT_TEST_SIZE
        }
    }

    /// Validate every setting.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if self.min_rows < self.cv_folds {
            return Err(LearningError::InvalidConfig(format!(
                "min_rows ({}) must be at least cv_folds ({})",
                self.min_rows, self.cv_folds
            )));
        }

        if self.preview_limit == 0 {
            return Err(LearningError::InvalidConfig(
                "preview_limit must be at least 1".to_string(),
            ));
        }

        self.preprocessing
            .validate()
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the target column name.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = Some(column.into());
        self
    }

    /// Set the test size fraction (default: 0.2).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the minimum number of rows required after preprocessing (default: 10).
    #[must_use]
    pub fn min_rows(mut self, rows: usize) -> Self {
        self.config.min_rows = rows;
        self
    }

    /// Set the preview row limit for whole-table prediction (default: 50).
    #[must_use]
    pub fn preview_limit(mut self, limit: usize) -> Self {
        self.config.preview_limit = limit;
        self
    }

    #[must_use]
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.config.id_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn group_column(mut self, column: impl Into<String>) -> Self {
        self.config.group_column = Some(column.into());
        self
    }

    /// Set the preprocessing configuration.
    #[must_use]
    pub fn preprocessing(mut self, preprocessing: PreprocessConfig) -> Self {
        self.config.preprocessing = preprocessing;
        self
    }

    /// Set the target inference rules.
    #[must_use]
    pub fn target_rules(mut self, rules: TargetRules) -> Self {
        self.config.target_rules = rules;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `cv_folds` is less than 2
    /// - `min_rows` is less than `cv_folds`
    /// - `preview_limit` is 0
    /// - a preprocessing threshold is not positive
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradecast_processing::{NumericImputation, OutlierStrategy};

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.min_rows, 10);
        assert!(config.target_column.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .target_column("score")
            .test_size(0.3)
            .random_seed(7)
            .group_column("class_id")
            .build()
            .unwrap();

        assert_eq!(config.target_column, Some("score".to_string()));
        assert!((config.test_size - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.group_column.as_deref(), Some("class_id"));
    }

    #[test]
    fn test_invalid_test_size_falls_back() {
        for size in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let config = TrainingConfig::builder().test_size(size).build().unwrap();
            assert_eq!(config.effective_test_size(), DEFAULT_TEST_SIZE);
        }
        let config = TrainingConfig::builder().test_size(0.3).build().unwrap();
        assert_eq!(config.effective_test_size(), 0.3);
    }

    #[test]
    fn test_invalid_cv_folds() {
        let result = TrainingConfig::builder().cv_folds(1).build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cv_folds"));
    }

    #[test]
    fn test_min_rows_below_folds() {
        let result = TrainingConfig::builder().cv_folds(5).min_rows(4).build();
        assert!(result.unwrap_err().to_string().contains("min_rows"));
    }

    #[test]
    fn test_invalid_preview_limit() {
        let result = TrainingConfig::builder().preview_limit(0).build();
        assert!(result.unwrap_err().to_string().contains("preview_limit"));
    }

    #[test]
    fn test_invalid_preprocessing_is_reported() {
        let preprocessing = PreprocessConfig {
            iqr_multiplier: 0.0,
            ..PreprocessConfig::default()
        };
        let result = TrainingConfig::builder().preprocessing(preprocessing).build();
        assert!(matches!(result, Err(LearningError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = r#"{
            "target_column": "总分",
            "preprocessing": {"missing_strategy": "median", "outlier_strategy": "zscore"}
        }"#;
        let config: TrainingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.target_column.as_deref(), Some("总分"));
        assert_eq!(config.preprocessing.missing_strategy, NumericImputation::Median);
        assert_eq!(config.preprocessing.outlier_strategy, OutlierStrategy::ZScore);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.target_rules, TargetRules::default());
    }
}
