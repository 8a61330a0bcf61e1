//! Configuration types for the preprocessor.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic setup.

use serde::{Deserialize, Serialize};

/// Strategy for handling outliers in numeric columns.
///
/// Both strategies replace offending values with the column mean; rows are
/// never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStrategy {
    /// Replace values outside `[Q1 - k*IQR, Q3 + k*IQR]`
    #[default]
    Iqr,
    /// Replace values whose absolute z-score exceeds the threshold
    #[serde(alias = "z-score", alias = "zscore")]
    ZScore,
}

impl OutlierStrategy {
    /// Returns the canonical name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iqr => "iqr",
            Self::ZScore => "zscore",
        }
    }
}

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumericImputation {
    /// Use the mean of non-null values
    #[default]
    Mean,
    /// Use the median of non-null values
    Median,
}

impl NumericImputation {
    /// Returns the canonical name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

/// Configuration for the preprocessor.
///
/// Use [`PreprocessConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```
/// use gradecast_processing::{NumericImputation, OutlierStrategy, PreprocessConfig};
///
/// let config = PreprocessConfig::builder()
///     .missing_strategy(NumericImputation::Median)
///     .outlier_strategy(OutlierStrategy::ZScore)
///     .build()
///     .unwrap();
/// assert_eq!(config.zscore_threshold, 3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Strategy for imputing missing numeric values.
    /// Default: Mean
    pub missing_strategy: NumericImputation,

    /// Strategy for handling outliers in numeric columns.
    /// Default: Iqr
    pub outlier_strategy: OutlierStrategy,

    /// Fence multiplier for the IQR strategy.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Absolute z-score above which a value counts as an outlier.
    /// Default: 3.0
    pub zscore_threshold: f64,

    /// Minimum non-missing values a column needs before outliers are handled.
    /// Default: 3
    pub min_outlier_values: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            missing_strategy: NumericImputation::default(),
            outlier_strategy: OutlierStrategy::default(),
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            min_outlier_values: 3,
        }
    }
}

impl PreprocessConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PreprocessConfigBuilder {
        PreprocessConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.iqr_multiplier.is_finite() && self.iqr_multiplier > 0.0) {
            return Err(ConfigValidationError::NonPositive {
                field: "iqr_multiplier".to_string(),
                value: self.iqr_multiplier,
            });
        }

        if !(self.zscore_threshold.is_finite() && self.zscore_threshold > 0.0) {
            return Err(ConfigValidationError::NonPositive {
                field: "zscore_threshold".to_string(),
                value: self.zscore_threshold,
            });
        }

        if self.min_outlier_values == 0 {
            return Err(ConfigValidationError::InvalidMinOutlierValues(
                self.min_outlier_values,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be a positive number)")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid minimum outlier values: {0} (must be at least 1)")]
    InvalidMinOutlierValues(usize),
}

/// Builder for [`PreprocessConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreprocessConfigBuilder {
    missing_strategy: Option<NumericImputation>,
    outlier_strategy: Option<OutlierStrategy>,
    iqr_multiplier: Option<f64>,
    zscore_threshold: Option<f64>,
    min_outlier_values: Option<usize>,
}

impl PreprocessConfigBuilder {
    /// Set the numeric imputation strategy.
    pub fn missing_strategy(mut self, strategy: NumericImputation) -> Self {
        self.missing_strategy = Some(strategy);
        self
    }

    /// Set the strategy for handling outliers.
    pub fn outlier_strategy(mut self, strategy: OutlierStrategy) -> Self {
        self.outlier_strategy = Some(strategy);
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the absolute z-score threshold.
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    /// Set the minimum number of non-missing values required for outlier handling.
    pub fn min_outlier_values(mut self, count: usize) -> Self {
        self.min_outlier_values = Some(count);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreprocessConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreprocessConfig, ConfigValidationError> {
        let defaults = PreprocessConfig::default();
        let config = PreprocessConfig {
            missing_strategy: self.missing_strategy.unwrap_or_default(),
            outlier_strategy: self.outlier_strategy.unwrap_or_default(),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            zscore_threshold: self.zscore_threshold.unwrap_or(defaults.zscore_threshold),
            min_outlier_values: self
                .min_outlier_values
                .unwrap_or(defaults.min_outlier_values),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessConfig::default();
        assert_eq!(config.missing_strategy, NumericImputation::Mean);
        assert_eq!(config.outlier_strategy, OutlierStrategy::Iqr);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.zscore_threshold, 3.0);
        assert_eq!(config.min_outlier_values, 3);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = PreprocessConfig::builder().build().unwrap();
        assert_eq!(config, PreprocessConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PreprocessConfig::builder()
            .missing_strategy(NumericImputation::Median)
            .outlier_strategy(OutlierStrategy::ZScore)
            .iqr_multiplier(3.0)
            .zscore_threshold(2.5)
            .min_outlier_values(5)
            .build()
            .unwrap();

        assert_eq!(config.missing_strategy, NumericImputation::Median);
        assert_eq!(config.outlier_strategy, OutlierStrategy::ZScore);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.zscore_threshold, 2.5);
        assert_eq!(config.min_outlier_values, 5);
    }

    #[test]
    fn test_validation_rejects_non_positive_multiplier() {
        let result = PreprocessConfig::builder().iqr_multiplier(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NonPositive { .. }
        ));

        let result = PreprocessConfig::builder().zscore_threshold(f64::NAN).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_min_values() {
        let result = PreprocessConfig::builder().min_outlier_values(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidMinOutlierValues(0)
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = PreprocessConfig::builder()
            .outlier_strategy(OutlierStrategy::ZScore)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"z_score\""));

        let parsed: PreprocessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_strategy_aliases_and_partial_json() {
        let parsed: PreprocessConfig =
            serde_json::from_str(r#"{"outlier_strategy": "z-score", "missing_strategy": "median"}"#)
                .unwrap();
        assert_eq!(parsed.outlier_strategy, OutlierStrategy::ZScore);
        assert_eq!(parsed.missing_strategy, NumericImputation::Median);
        assert_eq!(parsed.iqr_multiplier, 1.5);
    }
}
