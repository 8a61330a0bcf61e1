//! Integration tests for the preprocessing pipeline.
//!
//! These tests run the full preprocessor over CSV fixtures and JSON records.

use gradecast_processing::{
    ActionType, ColumnRole, NumericImputation, OutlierStrategy, PreprocessConfig,
    PreprocessedTable, Preprocessor, TableOverview, frame_from_json, preprocess,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|options| options.with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn values(table: &PreprocessedTable, name: &str) -> Vec<f64> {
    table
        .column_values(name)
        .unwrap()
        .into_iter()
        .map(|v| v.expect("no missing values after preprocessing"))
        .collect()
}

// ============================================================================
// Messy Grade Table
// ============================================================================

#[test]
fn test_messy_table_becomes_numeric() {
    let df = load_csv("grades_messy.csv");
    assert_eq!(df.height(), 12);

    let table = Preprocessor::default().preprocess(&df).unwrap();

    assert_eq!(table.height(), 11);
    assert_eq!(table.summary.duplicates_removed, 1);
    assert_eq!(table.data.width(), df.width());
    for column in table.data.get_columns() {
        assert_eq!(column.dtype(), &DataType::Float64);
        assert_eq!(column.null_count(), 0, "column {} has nulls", column.name());
    }
}

#[test]
fn test_messy_table_roles() {
    let table = Preprocessor::default()
        .preprocess(&load_csv("grades_messy.csv"))
        .unwrap();

    assert_eq!(table.role("student_id"), Some(ColumnRole::Numeric));
    assert_eq!(table.role("name"), Some(ColumnRole::Categorical));
    assert_eq!(table.role("exam_date"), Some(ColumnRole::Datetime));
    assert_eq!(table.role("passed"), Some(ColumnRole::Boolean));
    assert!(table.skipped_columns.is_empty());
}

#[test]
fn test_dates_become_days_since_epoch() {
    let table = Preprocessor::default()
        .preprocess(&load_csv("grades_messy.csv"))
        .unwrap();

    // 2024-01-10
    assert_eq!(values(&table, "exam_date")[0], 19732.0);
}

#[test]
fn test_outlier_and_imputed_hours() {
    let table = Preprocessor::default()
        .preprocess(&load_csv("grades_messy.csv"))
        .unwrap();

    let hours = values(&table, "hours");
    // jon's 90 hours is row 9 after the duplicate is dropped
    assert!((hours[9] - 12.9).abs() < 1e-9, "got {}", hours[9]);
    assert_eq!(hours[0], 5.0);
    assert!(table.summary.total_outliers() >= 1);
    assert!(table.summary.total_imputed() >= 1);
}

#[test]
fn test_text_columns_encoded_with_mode_fill() {
    let table = Preprocessor::default()
        .preprocess(&load_csv("grades_messy.csv"))
        .unwrap();

    let class = values(&table, "class");
    // A and B tie on frequency, the missing cell takes the smaller label
    assert_eq!(class[5], 0.0);
    assert_eq!(table.encoders["class"].classes(), &["A".to_string(), "B".to_string()][..]);
    assert!(
        table
            .summary
            .actions
            .iter()
            .any(|a| a.action_type == ActionType::CategoriesEncoded && a.target == "name")
    );
}

#[test]
fn test_median_and_zscore_strategies() {
    let df = load_csv("grades_messy.csv");

    let table = preprocess(&df, NumericImputation::Median, OutlierStrategy::ZScore).unwrap();

    // median of the ten present hours: 2 3 3 4 4 5 5 6 7 90
    assert_eq!(values(&table, "hours")[2], 4.5);
}

#[test]
fn test_raw_row_alignment() {
    let df = load_csv("grades_messy.csv");
    let table = Preprocessor::default().preprocess(&df).unwrap();

    let features = vec!["hours".to_string(), "class".to_string(), "exam_date".to_string()];
    let row = table.encode_row(&df, 3, &features).unwrap();

    assert_eq!(row, vec![Some(6.0), Some(1.0), Some(19735.0)]);
}

// ============================================================================
// JSON Records
// ============================================================================

#[test]
fn test_records_round_through_preprocessor() {
    let json = r#"[
        {"student_id": 1, "class": "A", "score": 70.5},
        {"student_id": 2, "class": "B", "score": null},
        {"student_id": 2, "class": "B", "score": null},
        {"student_id": 3, "score": 90}
    ]"#;

    let df = frame_from_json(json).unwrap();
    let table = Preprocessor::default().preprocess(&df).unwrap();

    assert_eq!(table.height(), 3);
    assert_eq!(table.kept_rows, vec![0, 1, 3]);
    assert_eq!(values(&table, "score"), vec![70.5, 80.25, 90.0]);
}

#[test]
fn test_summary_serializes_for_reporting() {
    let table = Preprocessor::new(PreprocessConfig::default())
        .preprocess(&load_csv("grades_messy.csv"))
        .unwrap();

    let json = serde_json::to_value(TableOverview::from(&table)).unwrap();

    assert_eq!(json["rows"], 11);
    assert_eq!(json["summary"]["duplicates_removed"], 1);
    assert_eq!(json["summary"]["actions"][0]["action_type"], "duplicates_removed");
}
