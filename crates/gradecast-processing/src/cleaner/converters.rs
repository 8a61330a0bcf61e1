//! Column normalization: every supported dtype becomes `f64` or text.

use crate::error::PreprocessingError;
use crate::types::ColumnRole;
use crate::utils::{DtypeCategory, datetime_to_days, get_dtype_category, to_f64_values};
use polars::prelude::*;
use tracing::warn;

/// Result of normalizing one column.
#[derive(Debug)]
pub(crate) enum Normalized {
    /// The column now holds `Float64` (numeric, datetime, boolean) or
    /// `String` (categorical) values.
    Column(Series, ColumnRole),
    /// The column has no numeric or textual representation.
    Unsupported(PreprocessingError),
}

/// Whether a column is converted during the datetime step rather than the
/// numeric unification step.
pub(crate) fn is_datetime_column(series: &Series) -> bool {
    get_dtype_category(series.dtype()) == DtypeCategory::Datetime
}

/// Normalize a single column according to its native dtype.
///
/// Datetime columns that cannot be turned into day offsets fall back to text
/// rather than failing the whole table.
pub(crate) fn normalize_column(series: &Series) -> Normalized {
    let name = series.name().clone();
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => float_column(name, to_f64_values(series), ColumnRole::Numeric)
            .unwrap_or_else(|reason| text_fallback(series, "Float64", reason)),
        DtypeCategory::Boolean => float_column(name, to_f64_values(series), ColumnRole::Boolean)
            .unwrap_or_else(|reason| text_fallback(series, "Float64", reason)),
        DtypeCategory::Datetime => {
            float_column(name, datetime_to_days(series), ColumnRole::Datetime)
                .unwrap_or_else(|reason| text_fallback(series, "day offset", reason))
        }
        DtypeCategory::String | DtypeCategory::Other => as_text(series),
    }
}

fn float_column(
    name: PlSmallStr,
    values: PolarsResult<Vec<Option<f64>>>,
    role: ColumnRole,
) -> Result<Normalized, String> {
    values
        .map(|values| Normalized::Column(Series::new(name, values), role))
        .map_err(|e| e.to_string())
}

fn text_fallback(series: &Series, target_type: &str, reason: String) -> Normalized {
    let err = PreprocessingError::TypeConversionFailed {
        column: series.name().to_string(),
        target_type: target_type.to_string(),
        reason,
    };
    warn!("{err}; treating the column as text");
    as_text(series)
}

fn as_text(series: &Series) -> Normalized {
    match series.cast(&DataType::String) {
        Ok(text) => Normalized::Column(text, ColumnRole::Categorical),
        Err(e) => Normalized::Unsupported(PreprocessingError::TypeConversionFailed {
            column: series.name().to_string(),
            target_type: "String".to_string(),
            reason: e.to_string(),
        }),
    }
}
