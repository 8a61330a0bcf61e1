//! Outlier handling module.
//!
//! Outliers in continuous columns are replaced by the column mean computed
//! before replacement. Row count is always preserved.

use crate::config::{OutlierStrategy, PreprocessConfig};
use crate::error::Result;
use crate::types::{ActionType, PreprocessingAction, PreprocessingSummary};
use crate::utils::{format_number, present_f64, to_f64_values};
use polars::prelude::*;
use tracing::debug;

/// Outliers detected in one column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierScan {
    /// Per-row flag, `true` where the value is an outlier.
    pub flags: Vec<bool>,
    /// Replacement value (mean of the column before replacement).
    pub replacement: f64,
    /// Human-readable description of the rule that was applied.
    pub rule: String,
}

impl OutlierScan {
    /// Number of flagged values.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|f| **f).count()
    }
}

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Detect outliers in a column's values.
    ///
    /// Returns `None` when the column is skipped: fewer present values than
    /// `min_outlier_values`, or a z-score scan over a zero/undefined spread.
    pub fn scan(values: &[Option<f64>], config: &PreprocessConfig) -> Option<OutlierScan> {
        let present = present_f64("values", values);
        if present.len() - present.null_count() < config.min_outlier_values {
            return None;
        }
        let column_mean = present.mean()?;

        match config.outlier_strategy {
            OutlierStrategy::Iqr => {
                let q1 = present.quantile(0.25, QuantileMethod::Linear).ok()??;
                let q3 = present.quantile(0.75, QuantileMethod::Linear).ok()??;
                let iqr = q3 - q1;
                let lower = q1 - config.iqr_multiplier * iqr;
                let upper = q3 + config.iqr_multiplier * iqr;
                let flags = values
                    .iter()
                    .map(|v| v.is_some_and(|x| x < lower || x > upper))
                    .collect();
                Some(OutlierScan {
                    flags,
                    replacement: column_mean,
                    rule: format!(
                        "outside [{}, {}]",
                        format_number(lower),
                        format_number(upper)
                    ),
                })
            }
            OutlierStrategy::ZScore => {
                let std = present.std(1)?;
                if !std.is_finite() || std == 0.0 {
                    return None;
                }
                let threshold = config.zscore_threshold;
                let flags = values
                    .iter()
                    .map(|v| v.is_some_and(|x| ((x - column_mean) / std).abs() > threshold))
                    .collect();
                Some(OutlierScan {
                    flags,
                    replacement: column_mean,
                    rule: format!("|z| > {}", format_number(threshold)),
                })
            }
        }
    }

    /// Replace outliers in one column with the column mean.
    ///
    /// Returns the number of values replaced.
    pub fn handle_column(
        df: &mut DataFrame,
        col_name: &str,
        config: &PreprocessConfig,
        summary: &mut PreprocessingSummary,
    ) -> Result<usize> {
        let values = to_f64_values(df.column(col_name)?.as_materialized_series())?;
        let Some(scan) = Self::scan(&values, config) else {
            debug!("Skipping outlier handling for '{}'", col_name);
            return Ok(0);
        };

        let replaced = scan.count();
        if replaced == 0 {
            return Ok(0);
        }

        let updated: Vec<Option<f64>> = values
            .iter()
            .zip(&scan.flags)
            .map(|(v, is_outlier)| if *is_outlier { Some(scan.replacement) } else { *v })
            .collect();
        df.replace(col_name, Series::new(col_name.into(), updated))?;

        debug!(
            "Replaced {} outliers in '{}' ({}) with mean {}",
            replaced, col_name, scan.rule, scan.replacement
        );
        summary.column_mut(col_name).outliers_replaced += replaced;
        summary.add_action(
            PreprocessingAction::new(
                ActionType::OutlierHandled,
                col_name,
                format!(
                    "Replaced {replaced} outliers with the column mean ({})",
                    config.outlier_strategy.as_str()
                ),
            )
            .with_details(format!(
                "{}, mean = {}",
                scan.rule,
                format_number(scan.replacement)
            )),
        );

        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zscore_config() -> PreprocessConfig {
        PreprocessConfig::builder()
            .outlier_strategy(OutlierStrategy::ZScore)
            .build()
            .unwrap()
    }

    #[test]
    fn test_iqr_replaces_with_original_mean() {
        let mut df = df!["x" => [10.0, 12.0, 11.0, 13.0, 1000.0]].unwrap();
        let mut summary = PreprocessingSummary::new();

        let replaced =
            OutlierHandler::handle_column(&mut df, "x", &PreprocessConfig::default(), &mut summary)
                .unwrap();

        assert_eq!(replaced, 1);
        let values: Vec<Option<f64>> = df
            .column("x")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        // mean of the original series: (10 + 12 + 11 + 13 + 1000) / 5
        assert_eq!(values[4], Some(209.2));
        assert_eq!(values[0], Some(10.0));
        assert_eq!(df.height(), 5);
        assert_eq!(summary.total_outliers(), 1);
    }

    #[test]
    fn test_too_few_values_are_skipped() {
        let values = [Some(1.0), Some(1000.0), None];
        assert!(OutlierHandler::scan(&values, &PreprocessConfig::default()).is_none());
    }

    #[test]
    fn test_zscore_skips_constant_column() {
        let values = [Some(5.0); 6];
        assert!(OutlierHandler::scan(&values, &zscore_config()).is_none());
    }

    #[test]
    fn test_zscore_flags_extreme_value() {
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(50.0 + (i % 5) as f64)).collect();
        values.push(Some(500.0));

        let scan = OutlierHandler::scan(&values, &zscore_config()).unwrap();
        assert_eq!(scan.count(), 1);
        assert!(scan.flags[20]);
        assert!(scan.rule.contains("|z| > 3"));
    }

    #[test]
    fn test_missing_values_are_never_flagged() {
        let values = [Some(1.0), Some(2.0), None, Some(3.0), Some(2.0)];
        let scan = OutlierHandler::scan(&values, &PreprocessConfig::default()).unwrap();
        assert!(!scan.flags[2]);
        assert_eq!(scan.count(), 0);
    }
}
