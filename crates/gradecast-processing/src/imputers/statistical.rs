//! Statistical imputation methods.
//!
//! Provides mean, median and mode imputation over normalized columns.

use crate::config::NumericImputation;
use crate::error::Result;
use crate::types::{ActionType, PreprocessingAction, PreprocessingSummary};
use crate::utils::{format_number, modal_values, present_f64, to_f64_values, to_string_values};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a continuous column with its mean or median.
    ///
    /// The statistic is computed over the present values of the current
    /// table. A column with no present values is left untouched, since its
    /// mean is undefined.
    pub fn apply_numeric(
        df: &mut DataFrame,
        col_name: &str,
        strategy: NumericImputation,
        summary: &mut PreprocessingSummary,
    ) -> Result<()> {
        let values = to_f64_values(df.column(col_name)?.as_materialized_series())?;
        let series = present_f64(col_name, &values);
        let fill_value = match strategy {
            NumericImputation::Mean => series.mean(),
            NumericImputation::Median => series.median(),
        };

        match fill_value {
            Some(fill_value) => {
                Self::fill_with_value(df, col_name, &values, fill_value, summary, strategy.as_str())
            }
            None => {
                debug!("Column '{}' has no values; leaving it missing", col_name);
                Ok(())
            }
        }
    }

    /// Fill a boolean column (stored as `0.0`/`1.0`) with its most frequent value.
    pub fn apply_flag_mode(
        df: &mut DataFrame,
        col_name: &str,
        summary: &mut PreprocessingSummary,
    ) -> Result<()> {
        let values = to_f64_values(df.column(col_name)?.as_materialized_series())?;
        let modes = modal_values(&present_f64(col_name, &values).into_series())?;
        match modes.f64()?.get(0) {
            Some(mode_val) => {
                Self::fill_with_value(df, col_name, &values, mode_val, summary, "mode")
            }
            None => Ok(()),
        }
    }

    /// Fill a text column with its mode, or the empty string when it has no values.
    pub fn apply_mode_imputation(
        df: &mut DataFrame,
        col_name: &str,
        summary: &mut PreprocessingSummary,
    ) -> Result<()> {
        let column = df
            .column(col_name)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let missing = column.null_count();
        if missing == 0 {
            return Ok(());
        }

        let modes = modal_values(&column)?;
        let mode_val = modes.str()?.get(0).unwrap_or_default().to_string();
        let values = to_string_values(&column)?;
        let filled: Vec<String> = values
            .into_iter()
            .map(|v| v.unwrap_or_else(|| mode_val.clone()))
            .collect();
        df.replace(col_name, Series::new(col_name.into(), filled))?;

        Self::record(summary, col_name, missing, "mode", format!("'{mode_val}'"));
        Ok(())
    }

    /// Fill numeric column with a specific value.
    fn fill_with_value(
        df: &mut DataFrame,
        col_name: &str,
        values: &[Option<f64>],
        fill_value: f64,
        summary: &mut PreprocessingSummary,
        method: &str,
    ) -> Result<()> {
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing == 0 {
            return Ok(());
        }

        let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill_value)).collect();
        df.replace(col_name, Series::new(col_name.into(), filled))?;

        Self::record(summary, col_name, missing, method, format_number(fill_value));
        Ok(())
    }

    fn record(
        summary: &mut PreprocessingSummary,
        col_name: &str,
        missing: usize,
        method: &str,
        fill_value: String,
    ) {
        debug!(
            "Filled {} missing values in '{}' with {} ({})",
            missing, col_name, method, fill_value
        );
        let column = summary.column_mut(col_name);
        column.missing_filled += missing;
        column.imputation_method = Some(method.to_string());
        summary.add_action(
            PreprocessingAction::new(
                ActionType::ValueImputed,
                col_name,
                format!("Filled {missing} missing values with the {method}"),
            )
            .with_details(format!("{method} = {fill_value}")),
        );
    }
}
