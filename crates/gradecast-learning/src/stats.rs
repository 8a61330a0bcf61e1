//! Descriptive summary of the raw target column.

use crate::error::{LearningError, Result};
use gradecast_processing::utils::{present_f64, to_f64_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Record counts and score range of a grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target_column: String,
    /// Rows in the raw table.
    pub total_records: usize,
    /// Rows whose target is a number.
    pub non_null: usize,
    /// Distinct non-null values of the entity column, when one was given
    /// and exists.
    pub entities: Option<usize>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Summarize `target` over the raw table.
///
/// Text cells that do not parse as numbers count as missing. The statistics
/// are `None` when no numeric value is present.
///
/// # Errors
///
/// [`LearningError::UnknownTargetColumn`] if `target` is not in `raw`.
pub fn summarize_target(
    raw: &DataFrame,
    target: &str,
    entity_column: Option<&str>,
) -> Result<TargetSummary> {
    let column = raw
        .column(target)
        .map_err(|_| LearningError::UnknownTargetColumn(target.to_string()))?;
    let values = present_f64(target, &to_f64_values(column.as_materialized_series())?);

    let entities = match entity_column.and_then(|name| raw.column(name).ok()) {
        Some(column) => Some(column.as_materialized_series().drop_nulls().n_unique()?),
        None => None,
    };

    Ok(TargetSummary {
        target_column: target.to_string(),
        total_records: raw.height(),
        non_null: values.len() - values.null_count(),
        entities,
        mean: values.mean(),
        min: values.min(),
        max: values.max(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_over_raw_rows() {
        let raw = df![
            "student_id" => [1i64, 1, 2, 3],
            "score" => [Some(60.0), None, Some(90.0), Some(75.0)],
        ]
        .unwrap();

        let summary = summarize_target(&raw, "score", Some("student_id")).unwrap();
        assert_eq!(
            summary,
            TargetSummary {
                target_column: "score".to_string(),
                total_records: 4,
                non_null: 3,
                entities: Some(3),
                mean: Some(75.0),
                min: Some(60.0),
                max: Some(90.0),
            }
        );
    }

    #[test]
    fn test_text_scores_and_null_entities() {
        let raw = df![
            "student_id" => [Some("a"), None, Some("b"), Some("a")],
            "score" => ["80", "absent", "70.5", "90"],
        ]
        .unwrap();

        let summary = summarize_target(&raw, "score", Some("student_id")).unwrap();
        assert_eq!(summary.non_null, 3);
        assert_eq!(summary.entities, Some(2));
        assert_eq!(summary.min, Some(70.5));
        assert_eq!(summary.max, Some(90.0));
    }

    #[test]
    fn test_empty_target_has_no_statistics() {
        let raw = df!["score" => [None::<f64>, None]].unwrap();
        let summary = summarize_target(&raw, "score", Some("student_id")).unwrap();

        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.entities, None);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.max, None);
    }

    #[test]
    fn test_unknown_target() {
        let raw = df!["score" => [1.0]].unwrap();
        assert!(matches!(
            summarize_target(&raw, "gpa", None),
            Err(LearningError::UnknownTargetColumn(_))
        ));
    }
}
