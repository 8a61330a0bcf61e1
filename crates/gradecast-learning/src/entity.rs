//! Locating an entity's latest row in a raw table.
//!
//! Key and filter values arrive as text. Against a numeric column they are
//! parsed and compared as numbers, so `"7"` and `"7.0"` both match an
//! integer `7` or a float `7.0`. Other columns compare as strings.

use crate::error::{LearningError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use gradecast_processing::utils::{
    datetime_to_days, is_datetime_dtype, is_numeric_dtype, to_f64_values, to_string_values,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Columns that order an entity's rows when several match, by priority.
pub const DEFAULT_ORDER_COLUMNS: [&str; 3] = ["grade_id", "score_id", "exam_date"];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Which rows belong to an entity and how to pick the latest one.
///
/// # Example
///
/// ```
/// use gradecast_learning::EntityQuery;
///
/// let query = EntityQuery::new("student_id", "1024").filter("course_id", "7");
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    pub key_column: String,
    pub key_value: String,
    /// Extra `(column, value)` equality filters. A filter on a column the
    /// table lacks is ignored.
    pub filters: Vec<(String, String)>,
    /// The first of these present in the table orders the matches.
    pub order_columns: Vec<String>,
}

/// Where an [`EntityQuery`] landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMatch {
    /// Raw row index of the latest matching row.
    pub row: usize,
    /// Number of rows that matched the key and filters.
    pub matched_rows: usize,
}

impl EntityQuery {
    pub fn new(key_column: impl Into<String>, key_value: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            key_value: key_value.into(),
            filters: Vec::new(),
            order_columns: DEFAULT_ORDER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn order_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Raw row indices matching the key and every applicable filter, in
    /// table order.
    ///
    /// # Errors
    ///
    /// [`LearningError::InvalidData`] if the key column is not in `raw`.
    pub fn matching_rows(&self, raw: &DataFrame) -> Result<Vec<usize>> {
        let key_column = raw.column(&self.key_column).map_err(|_| {
            LearningError::InvalidData(format!(
                "entity key column '{}' not found",
                self.key_column
            ))
        })?;

        let mut selected = cells_equal(key_column.as_materialized_series(), &self.key_value)?;

        for (column, value) in &self.filters {
            let Ok(filter_column) = raw.column(column) else {
                debug!("Ignoring filter on absent column '{}'", column);
                continue;
            };
            let cells = cells_equal(filter_column.as_materialized_series(), value)?;
            for (keep, cell) in selected.iter_mut().zip(cells) {
                *keep &= cell;
            }
        }

        Ok(selected
            .iter()
            .enumerate()
            .filter_map(|(idx, keep)| keep.then_some(idx))
            .collect())
    }

    /// Pick the latest of `rows`.
    ///
    /// Rows are sorted stably by the first order column present in `raw`,
    /// with null or unparseable keys first, and the last one is taken.
    /// Without an order column the last row in table order wins.
    pub fn latest_row(&self, raw: &DataFrame, rows: &[usize]) -> Result<Option<usize>> {
        let Some(column) = self
            .order_columns
            .iter()
            .find_map(|name| raw.column(name).ok())
        else {
            return Ok(rows.last().copied());
        };

        let keys = order_keys(column.as_materialized_series())?;
        let mut ordered = rows.to_vec();
        ordered.sort_by(|a, b| compare_keys(keys[*a], keys[*b]));
        debug!(
            "Ordered {} matching rows by '{}'",
            ordered.len(),
            column.name()
        );
        Ok(ordered.last().copied())
    }

    /// Find the entity's latest row.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidData`] if the key column is missing
    /// - [`LearningError::EntityNotFound`] if no row matches
    pub fn locate(&self, raw: &DataFrame) -> Result<EntityMatch> {
        let rows = self.matching_rows(raw)?;
        let row = self
            .latest_row(raw, &rows)?
            .ok_or_else(|| LearningError::EntityNotFound {
                column: self.key_column.clone(),
                value: self.key_value.clone(),
            })?;
        Ok(EntityMatch {
            row,
            matched_rows: rows.len(),
        })
    }
}

/// Per-row equality of `series` with a typed-in value. Nulls never match,
/// and neither does non-numeric text against a numeric column.
fn cells_equal(series: &Series, value: &str) -> PolarsResult<Vec<bool>> {
    let mask = if is_numeric_dtype(series.dtype()) {
        let Ok(target) = value.trim().parse::<f64>() else {
            return Ok(vec![false; series.len()]);
        };
        series.cast(&DataType::Float64)?.equal(target)?
    } else {
        series.cast(&DataType::String)?.str()?.equal(value)
    };
    Ok(mask.into_iter().map(|cell| cell == Some(true)).collect())
}

fn compare_keys(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

/// Sortable key per cell: numbers as-is, dates as days since the epoch,
/// strings parsed as dates or numbers.
fn order_keys(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    if is_datetime_dtype(series.dtype()) {
        return datetime_to_days(series);
    }
    if is_numeric_dtype(series.dtype()) {
        return to_f64_values(series);
    }
    Ok(to_string_values(series)?
        .into_iter()
        .map(|cell| cell.and_then(|s| parse_order_key(s.trim())))
        .collect())
}

fn parse_order_key(text: &str) -> Option<f64> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some((datetime - epoch.and_hms_opt(0, 0, 0)?).num_seconds() as f64 / 86_400.0);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some((date - epoch).num_days() as f64);
        }
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
