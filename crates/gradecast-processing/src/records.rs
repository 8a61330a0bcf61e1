//! Build a [`DataFrame`] from JSON row objects.
//!
//! Type inference is left to the Polars JSON reader; this module only checks
//! the row shape and fixes the column order.

use crate::error::{PreprocessingError, Result, ResultExt};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::io::Cursor;
use tracing::debug;

/// Build a table from an array of row objects (`[{col: value, ...}, ...]`).
///
/// Columns appear in order of first appearance across the rows. A column
/// whose present values are all integers becomes `Int64`, all numbers
/// `Float64`, all booleans `Boolean`, anything else `String`. Nested objects
/// and arrays are kept as their JSON text. A column with no present values
/// becomes an all-null `Float64`. Nulls and absent keys are null cells.
pub fn records_to_frame(records: &[Value]) -> Result<DataFrame> {
    let rows: Vec<&Map<String, Value>> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            record.as_object().ok_or_else(|| {
                PreprocessingError::InvalidRecords(format!("row {idx} is not an object"))
            })
        })
        .collect::<Result<_>>()?;

    let mut names: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }
    if names.is_empty() {
        return Ok(DataFrame::empty());
    }

    let flat: Vec<Map<String, Value>> = rows.iter().map(|row| flatten_nested(row)).collect();
    let bytes = serde_json::to_vec(&flat).context("serializing JSON records")?;
    let df = JsonReader::new(Cursor::new(bytes))
        .with_json_format(JsonFormat::Json)
        .infer_schema_len(None)
        .finish()
        .context("reading JSON records")?;

    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let column = df.column(name)?;
        columns.push(match column.dtype() {
            DataType::Null => column.cast(&DataType::Float64)?,
            _ => column.clone(),
        });
    }
    debug!("Read {} JSON records into {} columns", rows.len(), columns.len());
    Ok(DataFrame::new(columns)?)
}

/// Parse a JSON document holding an array of row objects.
pub fn frame_from_json(json: &str) -> Result<DataFrame> {
    match serde_json::from_str::<Value>(json).context("parsing JSON records")? {
        Value::Array(records) => records_to_frame(&records),
        other => Err(PreprocessingError::InvalidRecords(format!(
            "expected an array of objects, found {}",
            json_kind(&other)
        ))),
    }
}

/// Replace nested objects and arrays with their JSON text.
fn flatten_nested(row: &Map<String, Value>) -> Map<String, Value> {
    row.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
