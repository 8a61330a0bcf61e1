//! Shared utilities for the preprocessor.
//!
//! Dtype classification, Series value extraction and the Polars-backed
//! statistics helpers used by imputation, outlier handling and the
//! learning crate.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for preprocessing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Calendar dates and timestamps (convertible to day offsets)
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other types (time of day, durations, nested values, ...)
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType can be expressed as a day offset from the epoch.
///
/// `Time` is deliberately absent: a time of day has no calendar position.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Check if a DataType is boolean.
#[inline]
pub fn is_boolean_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Boolean)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if is_boolean_dtype(dtype) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Series Value Extraction
// =============================================================================

/// Cast a Series to `f64` values. `NaN` is reported as missing.
pub fn to_f64_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Cast a Series to owned string values.
pub fn to_string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Convert a `Date` or `Datetime` Series to fractional days since 1970-01-01.
pub fn datetime_to_days(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let units_per_day = match series.dtype() {
        DataType::Date => 1.0,
        DataType::Datetime(TimeUnit::Milliseconds, _) => 86_400e3,
        DataType::Datetime(TimeUnit::Microseconds, _) => 86_400e6,
        DataType::Datetime(TimeUnit::Nanoseconds, _) => 86_400e9,
        other => {
            return Err(PolarsError::InvalidOperation(
                format!("cannot express {other} as a day offset").into(),
            ));
        }
    };

    let physical = series.to_physical_repr();
    Ok(to_f64_values(physical.as_ref())?
        .into_iter()
        .map(|v| v.map(|x| x / units_per_day))
        .collect())
}

/// Render a numeric cell the way a user would type it: integral values lose
/// their trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Render every cell of a Series as an optional string for key comparisons.
///
/// Numeric columns go through [`format_number`] so that `7`, `7.0` and `"7"`
/// compare equal.
pub fn to_key_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    if is_numeric_dtype(series.dtype()) {
        Ok(to_f64_values(series)?
            .into_iter()
            .map(|v| v.map(format_number))
            .collect())
    } else {
        to_string_values(series)
    }
}

// =============================================================================
// Descriptive Statistics
// =============================================================================

/// Wrap values from [`to_f64_values`] as a `Float64` chunked array.
///
/// Polars aggregations (`mean`, `median`, `std`, `quantile`) skip the nulls.
pub fn present_f64(name: &str, values: &[Option<f64>]) -> Float64Chunked {
    Float64Chunked::from_iter_options(name.into(), values.iter().copied())
}

/// Most frequent non-null values of a Series, sorted ascending.
///
/// The first element is the mode with ties resolved to the smallest value
/// (lexicographically for text). Empty when the Series has no values.
pub fn modal_values(series: &Series) -> PolarsResult<Series> {
    let present = series.drop_nulls().with_name("value".into());
    if present.is_empty() {
        return Ok(present);
    }

    let counts = present.value_counts(false, false, "count".into(), false)?;
    let count = counts.column("count")?.as_materialized_series();
    let Some(top) = count.max::<IdxSize>()? else {
        return Ok(present.slice(0, 0));
    };
    let modal = counts.filter(&count.equal(top)?)?;
    modal
        .column("value")?
        .as_materialized_series()
        .sort(SortOptions::default())
}

// =============================================================================
// Tests
// =============================================================================
