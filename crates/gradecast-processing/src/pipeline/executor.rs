//! Preprocessing executor module.
//!
//! Runs the fixed sequence of preprocessing steps over a raw table and
//! produces a fully numeric [`PreprocessedTable`].

use crate::cleaner::DataCleaner;
use crate::cleaner::converters::{Normalized, is_datetime_column, normalize_column};
use crate::config::{NumericImputation, OutlierStrategy, PreprocessConfig};
use crate::encoding::{EncoderMap, LabelEncoder};
use crate::error::{Result, ResultExt};
use crate::imputers::StatisticalImputer;
use crate::pipeline::outliers::OutlierHandler;
use crate::table::PreprocessedTable;
use crate::types::{ActionType, ColumnInfo, ColumnRole, PreprocessingAction, PreprocessingSummary};
use crate::utils::to_string_values;
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cleans raw tables into numeric feature tables.
///
/// Steps, in order:
/// 1. Remove exact duplicate rows (first occurrence kept)
/// 2. Convert datetime columns to day offsets
/// 3. Cast integer, float and boolean columns to `f64`
/// 4. Impute missing values (mean/median for continuous, mode otherwise)
/// 5. Replace outliers in continuous columns with the column mean
/// 6. Label-encode text columns
///
/// The preprocessor never fails on messy data. All-null and zero-variance
/// columns degrade gracefully, and columns that have no numeric or textual
/// representation are left out and listed in
/// [`PreprocessedTable::skipped_columns`].
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

/// Preprocess a table with the given strategies and default thresholds.
pub fn preprocess(
    df: &DataFrame,
    missing_strategy: NumericImputation,
    outlier_strategy: OutlierStrategy,
) -> Result<PreprocessedTable> {
    let config = PreprocessConfig {
        missing_strategy,
        outlier_strategy,
        ..PreprocessConfig::default()
    };
    Preprocessor::new(config).preprocess(df)
}

impl Preprocessor {
    /// Create a preprocessor with the given configuration.
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run every preprocessing step over `df`.
    pub fn preprocess(&self, df: &DataFrame) -> Result<PreprocessedTable> {
        let start = Instant::now();
        let mut summary = PreprocessingSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        info!("Step 1: Removing duplicate rows...");
        let (deduped, kept_rows) =
            DataCleaner::remove_duplicates(df).context("removing duplicate rows")?;
        summary.rows_after = deduped.height();
        summary.duplicates_removed = summary.rows_before - summary.rows_after;
        if summary.duplicates_removed > 0 {
            summary.add_action(PreprocessingAction::new(
                ActionType::DuplicatesRemoved,
                "dataset",
                format!("Removed {} duplicate rows", summary.duplicates_removed),
            ));
        }

        let (mut work, columns, skipped_columns) = self.normalize_columns(&deduped, &mut summary)?;

        info!("Step 4: Imputing missing values ({})...", self.config.missing_strategy.as_str());
        for column in &columns {
            let imputed = match column.role {
                ColumnRole::Numeric | ColumnRole::Datetime => StatisticalImputer::apply_numeric(
                    &mut work,
                    &column.name,
                    self.config.missing_strategy,
                    &mut summary,
                ),
                ColumnRole::Boolean => {
                    StatisticalImputer::apply_flag_mode(&mut work, &column.name, &mut summary)
                }
                ColumnRole::Categorical => {
                    StatisticalImputer::apply_mode_imputation(&mut work, &column.name, &mut summary)
                }
            };
            imputed.context(format!("imputing column '{}'", column.name))?;
        }

        info!("Step 5: Handling outliers ({})...", self.config.outlier_strategy.as_str());
        let mut outliers = 0;
        for column in columns.iter().filter(|c| c.role.is_continuous()) {
            outliers += OutlierHandler::handle_column(&mut work, &column.name, &self.config, &mut summary)
                .context(format!("handling outliers in '{}'", column.name))?;
        }
        debug!("Replaced {} outliers in total", outliers);

        info!("Step 6: Label-encoding categorical columns...");
        let encoders = self
            .encode_categoricals(&mut work, &columns, &mut summary)
            .context("label-encoding categorical columns")?;

        summary.columns_after = work.width();
        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Preprocessing complete: {} rows x {} columns ({} duplicates, {} imputed, {} outliers)",
            work.height(),
            work.width(),
            summary.duplicates_removed,
            summary.total_imputed(),
            summary.total_outliers()
        );

        Ok(PreprocessedTable {
            data: work,
            encoders,
            columns,
            kept_rows,
            skipped_columns,
            summary,
        })
    }

    /// Steps 2 and 3: datetime conversion first, then numeric unification.
    /// Column order of the input is preserved.
    fn normalize_columns(
        &self,
        df: &DataFrame,
        summary: &mut PreprocessingSummary,
    ) -> Result<(DataFrame, Vec<ColumnInfo>, Vec<String>)> {
        let mut slots: Vec<Option<(Series, ColumnInfo)>> = vec![None; df.width()];
        let mut skipped = Vec::new();
        let indexed: Vec<(usize, &Series)> = df
            .get_columns()
            .iter()
            .map(|c| c.as_materialized_series())
            .enumerate()
            .collect();

        info!("Step 2: Converting datetime columns to day offsets...");
        for (idx, series) in indexed.iter().filter(|(_, s)| is_datetime_column(s)) {
            slots[*idx] = Self::normalize_one(series, &mut skipped, summary);
        }

        info!("Step 3: Unifying numeric column types...");
        for (idx, series) in indexed.iter().filter(|(_, s)| !is_datetime_column(s)) {
            slots[*idx] = Self::normalize_one(series, &mut skipped, summary);
        }

        let (series, columns): (Vec<Series>, Vec<ColumnInfo>) = slots.into_iter().flatten().unzip();
        let work = DataFrame::new(series.into_iter().map(Column::from).collect())?;
        Ok((work, columns, skipped))
    }

    fn normalize_one(
        series: &Series,
        skipped: &mut Vec<String>,
        summary: &mut PreprocessingSummary,
    ) -> Option<(Series, ColumnInfo)> {
        let name = series.name().to_string();
        let original_type = series.dtype().to_string();
        match normalize_column(series) {
            Normalized::Column(converted, role) => {
                Self::record_conversion(summary, &name, &original_type, role);
                Some((
                    converted,
                    ColumnInfo {
                        name,
                        role,
                        original_type,
                    },
                ))
            }
            Normalized::Unsupported(err) => {
                warn!("Leaving out column '{}': {}", name, err);
                summary.add_warning(format!("Column '{name}' was left out: {err}"));
                summary.add_action(PreprocessingAction::new(
                    ActionType::ColumnRemoved,
                    &name,
                    format!("Column of type {original_type} has no numeric representation"),
                ));
                skipped.push(name);
                None
            }
        }
    }

    fn record_conversion(
        summary: &mut PreprocessingSummary,
        name: &str,
        original_type: &str,
        role: ColumnRole,
    ) {
        let action = match role {
            ColumnRole::Datetime => PreprocessingAction::new(
                ActionType::DatetimeConverted,
                name,
                "Converted to days since 1970-01-01",
            ),
            ColumnRole::Categorical if original_type != "str" => PreprocessingAction::new(
                ActionType::TypeCorrected,
                name,
                format!("Treated {original_type} column as text"),
            ),
            ColumnRole::Categorical => return,
            ColumnRole::Numeric | ColumnRole::Boolean if original_type == "f64" => return,
            ColumnRole::Numeric | ColumnRole::Boolean => PreprocessingAction::new(
                ActionType::TypeCorrected,
                name,
                format!("Cast {original_type} to f64"),
            ),
        };
        debug!("{}: {}", name, action.description);
        summary.add_action(action);
    }

    fn encode_categoricals(
        &self,
        work: &mut DataFrame,
        columns: &[ColumnInfo],
        summary: &mut PreprocessingSummary,
    ) -> Result<EncoderMap> {
        let mut encoders = EncoderMap::new();

        for column in columns.iter().filter(|c| c.role == ColumnRole::Categorical) {
            let labels: Vec<String> =
                to_string_values(work.column(&column.name)?.as_materialized_series())?
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect();
            let (encoder, codes) = LabelEncoder::fit_transform(&labels);
            let codes: Vec<f64> = codes.into_iter().map(|c| c as f64).collect();
            work.replace(&column.name, Series::new(column.name.as_str().into(), codes))?;

            debug!("Encoded '{}' with {} labels", column.name, encoder.len());
            summary.column_mut(&column.name).distinct_labels = Some(encoder.len());
            summary.add_action(PreprocessingAction::new(
                ActionType::CategoriesEncoded,
                &column.name,
                format!("Label-encoded {} distinct values", encoder.len()),
            ));
            encoders.insert(column.name.clone(), encoder);
        }

        Ok(encoders)
    }
}
