//! Row and column cleaning ahead of imputation.
//!
//! This module provides:
//! - Exact duplicate row removal that remembers which input rows survived
//! - Dtype normalization of every column to `f64` or text (see [`converters`])

pub(crate) mod converters;

use crate::error::Result;
use polars::prelude::*;
use tracing::debug;

/// Data cleaner for the row-level steps of preprocessing.
pub struct DataCleaner;

impl DataCleaner {
    /// Remove exact duplicate rows, keeping the first occurrence.
    ///
    /// Survivors keep their relative order. Returns the deduplicated frame and
    /// the original index of every kept row. Missing cells compare equal to
    /// each other, as do `NaN` floats.
    pub fn remove_duplicates(df: &DataFrame) -> Result<(DataFrame, Vec<usize>)> {
        let height = df.height();
        if height == 0 || df.width() == 0 {
            return Ok((df.clone(), (0..height).collect()));
        }

        // Positional names keep the row index clear of user columns, and
        // `-0.0 + 0.0` folds signed zeros together.
        let mut key_columns = Vec::with_capacity(df.width());
        for (idx, column) in df.get_columns().iter().enumerate() {
            let key = match column.dtype() {
                DataType::Float32 | DataType::Float64 => column
                    .cast(&DataType::Float64)?
                    .f64()?
                    .apply_values(|v| v + 0.0)
                    .into_column(),
                _ => column.clone(),
            };
            key_columns.push(key.with_name(format!("k{idx}").into()));
        }
        let subset: Vec<String> = (0..df.width()).map(|idx| format!("k{idx}")).collect();

        let unique = DataFrame::new(key_columns)?
            .with_row_index("row".into(), None)?
            .unique_stable(Some(&subset), UniqueKeepStrategy::First, None)?;
        let kept_rows: Vec<usize> = unique
            .column("row")?
            .idx()?
            .into_no_null_iter()
            .map(|row| row as usize)
            .collect();

        if kept_rows.len() == height {
            debug!("No duplicate rows found");
            return Ok((df.clone(), kept_rows));
        }

        debug!("Removed {} duplicate rows", height - kept_rows.len());
        let take = unique.column("row")?.idx()?.clone();
        Ok((df.take(&take)?, kept_rows))
    }
}
