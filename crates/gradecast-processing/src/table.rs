//! The preprocessed table and the metadata needed to map raw rows onto it.

use crate::encoding::EncoderMap;
use crate::error::{PreprocessingError, Result};
use crate::types::{ColumnInfo, ColumnRole, PreprocessingSummary};
use crate::utils::{datetime_to_days, is_datetime_dtype, to_f64_values, to_string_values};
use polars::prelude::*;
use serde::Serialize;

/// Output of [`crate::Preprocessor::preprocess`].
///
/// Every column of `data` is `Float64`. Continuous columns that had no
/// present values at all remain missing; every other cell is filled.
#[derive(Debug, Clone)]
pub struct PreprocessedTable {
    /// The fully numeric table.
    pub data: DataFrame,
    /// Label encoders fitted on the text columns, keyed by column name.
    pub encoders: EncoderMap,
    /// Column metadata in table order.
    pub columns: Vec<ColumnInfo>,
    /// For every output row, the index of the raw row it came from.
    pub kept_rows: Vec<usize>,
    /// Columns of the raw table with no numeric or textual representation.
    pub skipped_columns: Vec<String>,
    /// What the preprocessor did.
    pub summary: PreprocessingSummary,
}

static_assertions::assert_impl_all!(PreprocessedTable: Send, Sync);

impl PreprocessedTable {
    /// Number of rows after deduplication.
    pub fn height(&self) -> usize {
        self.data.height()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_info(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn role(&self, name: &str) -> Option<ColumnRole> {
        self.column_info(name).map(|c| c.role)
    }

    /// Values of a column, `None` where the cell is missing.
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self
            .data
            .column(name)
            .map_err(|_| PreprocessingError::ColumnNotFound(name.to_string()))?;
        Ok(to_f64_values(column.as_materialized_series())?)
    }

    /// Encode one row of the raw table into the numeric space of this table.
    ///
    /// Each requested column is converted the way the preprocessor converted
    /// it: datetimes become day offsets, booleans `0`/`1`, text goes through
    /// the fitted label encoder. The result is `None` for a column that is
    /// absent from `raw` or from this table, for a missing cell, and for a
    /// label the encoder never saw. No imputation or outlier replacement is
    /// applied.
    pub fn encode_row(
        &self,
        raw: &DataFrame,
        row: usize,
        columns: &[String],
    ) -> Result<Vec<Option<f64>>> {
        if row >= raw.height() {
            return Err(PreprocessingError::RowOutOfBounds {
                row,
                height: raw.height(),
            });
        }
        let single = raw.slice(row as i64, 1);

        columns
            .iter()
            .map(|name| {
                let (Some(role), Ok(cell)) = (self.role(name), single.column(name)) else {
                    return Ok(None);
                };
                self.encode_cell(name, role, cell.as_materialized_series())
            })
            .collect()
    }

    fn encode_cell(&self, name: &str, role: ColumnRole, cell: &Series) -> Result<Option<f64>> {
        let value = match role {
            ColumnRole::Categorical => {
                let label = to_string_values(cell)?.into_iter().next().flatten();
                label.and_then(|label| {
                    self.encoders
                        .get(name)
                        .and_then(|encoder| encoder.encode(&label))
                        .map(|code| code as f64)
                })
            }
            ColumnRole::Datetime if is_datetime_dtype(cell.dtype()) => {
                datetime_to_days(cell)?.into_iter().next().flatten()
            }
            ColumnRole::Datetime | ColumnRole::Numeric | ColumnRole::Boolean => {
                to_f64_values(cell)?.into_iter().next().flatten()
            }
        };
        Ok(value)
    }
}

/// Serializable view of a table's metadata, without the data itself.
#[derive(Debug, Clone, Serialize)]
pub struct TableOverview<'a> {
    pub rows: usize,
    pub columns: &'a [ColumnInfo],
    pub skipped_columns: &'a [String],
    pub summary: &'a PreprocessingSummary,
}

impl<'a> From<&'a PreprocessedTable> for TableOverview<'a> {
    fn from(table: &'a PreprocessedTable) -> Self {
        Self {
            rows: table.height(),
            columns: &table.columns,
            skipped_columns: &table.skipped_columns,
            summary: &table.summary,
        }
    }
}
