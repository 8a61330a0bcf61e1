//! Training and prediction orchestration.
//!
//! This module provides the [`Trainer`] struct and its builder. Every
//! operation works on a snapshot of the raw table and retrains from scratch;
//! no fitted model outlives the call that produced it.
//!
//! # Overview
//!
//! A training run executes these stages in order:
//!
//! 1. **Preprocessing** - Deduplicate, impute, replace outliers, encode text
//! 2. **Target resolution** - Use the configured target or infer one
//! 3. **Splitting** - Build the feature matrix and a seeded train/test split
//! 4. **Model selection** - Cross-validate and tune every candidate family
//! 5. **Evaluation** - Score the winner on the held-out rows
//! 6. **Refitting** - Refit the winning configuration on every row
//!
//! # Example
//!
//! ```rust,ignore
//! use gradecast_learning::{EntityQuery, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::builder().target_column("score").build()?)
//!     .on_progress(|update| println!("{:.0}% - {}", update.progress * 100.0, update.message))
//!     .build();
//!
//! let result = trainer.train_and_evaluate(&grades)?;
//! println!("Best model: {} (r2 {:.3})", result.best_model_name, result.metrics.r2);
//!
//! let prediction = trainer.predict_for_entity(&grades, &EntityQuery::new("student_id", "1024"))?;
//! println!("Predicted score: {:.1}", prediction.predicted);
//! ```

use crate::cancellation::{CancellationToken, check_cancelled};
use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::diagnostics::{Diagnostics, PreviewRow};
use crate::entity::EntityQuery;
use crate::error::{LearningError, Result};
use crate::metrics::Metrics;
use crate::models::Regressor;
use crate::progress::{ProgressCallback, ProgressReporter, ProgressUpdate, TrainingStage};
use crate::selector::{ModelSelector, get_feature_importance};
use crate::stats::{TargetSummary, summarize_target};
use crate::types::{EntityPrediction, Predictions, TablePrediction, TrainingResult};
use gradecast_processing::utils::{to_f64_values, to_key_strings};
use gradecast_processing::{PreprocessedTable, Preprocessor};
use ndarray::Array1;
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs training and prediction over raw grade tables.
///
/// Use [`Trainer::builder()`] to construct a trainer with the builder pattern.
///
/// # Thread Safety
///
/// `Trainer` is `Send + Sync`; concurrent calls share nothing but the
/// configuration, the callback and the cancellation token.
pub struct Trainer {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(Trainer: Send, Sync);

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

/// The all-data refit and everything needed to predict with it.
struct TrainedModel {
    model: Box<dyn Regressor>,
    dataset: Dataset,
    table: PreprocessedTable,
    result: TrainingResult,
}

impl TrainedModel {
    fn predict_all(&self) -> Result<Array1<f64>> {
        Ok(non_negative(self.model.predict(&self.dataset.x)?))
    }
}

/// Scores cannot be negative.
fn non_negative(predictions: Array1<f64>) -> Array1<f64> {
    predictions.mapv_into(|p| p.max(0.0))
}

impl Trainer {
    /// Create a new builder for `Trainer`.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Get the training configuration.
    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Preprocess `df`, select the best model on a training split and
    /// evaluate it on the held-out rows.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError`] if:
    /// - [`InvalidConfig`](LearningError::InvalidConfig): the configuration does not validate
    /// - [`UnknownTargetColumn`](LearningError::UnknownTargetColumn): the configured target is absent
    /// - [`NoTargetColumnFound`](LearningError::NoTargetColumnFound): no target could be inferred
    /// - [`InsufficientData`](LearningError::InsufficientData): fewer rows than `min_rows`
    /// - [`UnalignableFeatures`](LearningError::UnalignableFeatures): only the target survived
    /// - [`TrainingFailed`](LearningError::TrainingFailed): no candidate family could be fitted
    /// - [`Cancelled`](LearningError::Cancelled): the cancellation token was triggered
    pub fn train_and_evaluate(&self, df: &DataFrame) -> Result<TrainingResult> {
        self.fit(df).map(|trained| trained.result)
    }

    /// Train on `df` and predict the target for the latest row of one entity.
    ///
    /// The entity is located before training, so an unknown key fails fast.
    /// The row is converted with the fitted encoders; features it lacks are
    /// filled with their all-data means.
    ///
    /// # Errors
    ///
    /// Everything [`train_and_evaluate`](Self::train_and_evaluate) returns, plus:
    /// - [`InvalidData`](LearningError::InvalidData): the key column is absent
    /// - [`EntityNotFound`](LearningError::EntityNotFound): no row matches the key
    pub fn predict_for_entity(
        &self,
        df: &DataFrame,
        query: &EntityQuery,
    ) -> Result<EntityPrediction> {
        let found = query.locate(df)?;
        info!(
            "Entity {}={} matched {} rows, using row {}",
            query.key_column, query.key_value, found.matched_rows, found.row
        );

        let trained = self.fit(df)?;
        let values = trained
            .table
            .encode_row(df, found.row, &trained.dataset.feature_names)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            info!("Filled {} missing features with training means", missing);
        }

        let x = trained.dataset.align_row(&values)?;
        let predicted = non_negative(trained.model.predict(&x)?)
            .first()
            .copied()
            .ok_or_else(|| LearningError::TrainingFailed("model returned no prediction".into()))?;

        Ok(EntityPrediction {
            key_value: query.key_value.clone(),
            predicted,
            target_column: trained.result.target_column,
            metrics: trained.result.metrics,
            feature_importance: trained.result.feature_importance,
            matched_rows: found.matched_rows,
        })
    }

    /// Train on `df` and predict every preprocessed row with the all-data
    /// refit, with previews and diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`train_and_evaluate`](Self::train_and_evaluate).
    pub fn predict_table(&self, df: &DataFrame) -> Result<TablePrediction> {
        let trained = self.fit(df)?;
        let predicted = trained.predict_all()?.to_vec();
        let actual = trained.dataset.y.to_vec();
        let rows = &trained.table.kept_rows;
        let limit = self.config.preview_limit;

        let ids = raw_labels(df, self.config.id_column.as_deref(), rows)?;
        let groups = raw_labels(df, self.config.group_column.as_deref(), rows)?;
        let target_missing = raw_target_missing(df, &trained.result.target_column, rows)?;

        let preview_row = |i: usize| PreviewRow {
            row: rows[i],
            id: ids.as_ref().and_then(|ids| ids[i].clone()),
            predicted: predicted[i],
            actual: (!target_missing[i]).then_some(actual[i]),
        };
        let preview: Vec<PreviewRow> = (0..predicted.len().min(limit)).map(preview_row).collect();
        let predicted_missing: Vec<PreviewRow> = (0..predicted.len())
            .filter(|i| target_missing[*i])
            .take(limit)
            .map(preview_row)
            .collect();

        let diagnostics = Diagnostics::compute(
            &actual,
            &predicted,
            rows,
            ids.as_deref(),
            groups.as_deref(),
        );

        info!(
            "Predicted {} rows ({} with a missing target)",
            predicted.len(),
            target_missing.iter().filter(|m| **m).count()
        );

        Ok(TablePrediction {
            target_column: trained.result.target_column,
            best_model_name: trained.result.best_model_name,
            metrics: trained.result.metrics,
            preview,
            predicted_missing,
            diagnostics,
        })
    }

    /// Summarize the target column of the raw table.
    ///
    /// Without a configured target, the table is preprocessed only to infer one.
    pub fn summarize_target(
        &self,
        df: &DataFrame,
        entity_column: Option<&str>,
    ) -> Result<TargetSummary> {
        let target = match &self.config.target_column {
            Some(target) => target.clone(),
            None => {
                let table = Preprocessor::new(self.config.preprocessing.clone()).preprocess(df)?;
                self.config.target_rules.resolve(None, &table.columns)?
            }
        };
        summarize_target(df, &target, entity_column)
    }

    fn fit(&self, df: &DataFrame) -> Result<TrainedModel> {
        let reporter = ProgressReporter::new(self.progress_callback.as_ref());
        match self.run(df, reporter) {
            Ok(trained) => {
                reporter.stage(TrainingStage::Complete, 1.0, "Training complete");
                Ok(trained)
            }
            Err(LearningError::Cancelled) => {
                warn!("Training cancelled");
                reporter.stage(TrainingStage::Cancelled, 1.0, "Training cancelled");
                Err(LearningError::Cancelled)
            }
            Err(e) => {
                reporter.stage(TrainingStage::Failed, 1.0, e.to_string());
                Err(e)
            }
        }
    }

    fn run(&self, df: &DataFrame, progress: ProgressReporter<'_>) -> Result<TrainedModel> {
        let start = Instant::now();
        let cancel = self.cancellation_token.as_ref();
        let config = &self.config;

        progress.stage(
            TrainingStage::Initializing,
            0.0,
            format!("Training on {} rows", df.height()),
        );
        config.validate()?;
        check_cancelled(cancel)?;

        // 1. Preprocess
        progress.stage(TrainingStage::Preprocessing, 0.05, "Preprocessing table");
        let table = Preprocessor::new(config.preprocessing.clone()).preprocess(df)?;
        if table.height() < config.min_rows {
            return Err(LearningError::InsufficientData {
                rows: table.height(),
                required: config.min_rows,
            });
        }
        check_cancelled(cancel)?;

        // 2. Resolve the target
        progress.stage(TrainingStage::TargetResolution, 0.1, "Resolving target column");
        let target = config
            .target_rules
            .resolve(config.target_column.as_deref(), &table.columns)?;
        info!("Target column: '{}'", target);

        // 3. Features and split
        progress.stage(TrainingStage::Splitting, 0.15, "Splitting train and test rows");
        let dataset = Dataset::from_table(&table, &target)?;
        let split = dataset.split(config.effective_test_size(), config.random_seed);
        info!(
            "Split {} rows into {} train / {} test",
            dataset.n_rows(),
            split.train_indices.len(),
            split.test_indices.len()
        );
        check_cancelled(cancel)?;

        // 4. Model selection
        progress.stage(TrainingStage::ModelSelection, 0.2, "Selecting model");
        let selection = ModelSelector::new(config.cv_folds, config.random_seed)
            .select_with_progress(&split.x_train, &split.y_train, cancel, progress, (0.2, 0.8))?;

        // 5. Held-out evaluation
        progress.stage(TrainingStage::Evaluation, 0.85, "Evaluating on held-out rows");
        let test_predictions = non_negative(selection.best_model.predict(&split.x_test)?);
        let metrics = Metrics::compute(split.y_test.view(), test_predictions.view());
        info!(
            "Held-out metrics: R² {:.4}, MAE {:.4}, RMSE {:.4}",
            metrics.r2, metrics.mae, metrics.rmse
        );
        check_cancelled(cancel)?;

        // 6. Refit on every row
        progress.stage(TrainingStage::Refitting, 0.9, "Refitting on all rows");
        let mut model = selection.best_model.boxed_clone();
        model.fit(&dataset.x, &dataset.y)?;
        let feature_importance = get_feature_importance(model.as_ref(), &dataset.feature_names);

        let mut warnings = table.summary.warnings.clone();
        warnings.extend(selection.warnings);

        let result = TrainingResult {
            target_column: target,
            feature_names: dataset.feature_names.clone(),
            best_model_name: selection.best_family.as_str().to_string(),
            metrics,
            model_results: selection.results,
            best_params: selection.best_params,
            feature_importance,
            predictions: Predictions {
                actual: split.y_test.to_vec(),
                predicted: test_predictions.to_vec(),
            },
            train_rows: split.train_indices.len(),
            test_rows: split.test_indices.len(),
            total_rows: dataset.n_rows(),
            training_time_seconds: start.elapsed().as_secs_f64(),
            warnings,
            skipped_columns: table.skipped_columns.clone(),
        };

        Ok(TrainedModel {
            model,
            dataset,
            table,
            result,
        })
    }
}

/// Raw values of an optional label column, aligned with the kept rows.
/// `None` when no column is configured or the table lacks it.
fn raw_labels(
    df: &DataFrame,
    column: Option<&str>,
    rows: &[usize],
) -> Result<Option<Vec<Option<String>>>> {
    let Some(column) = column.and_then(|name| df.column(name).ok()) else {
        return Ok(None);
    };
    let labels = to_key_strings(column.as_materialized_series())?;
    Ok(Some(rows.iter().map(|r| labels[*r].clone()).collect()))
}

/// Whether each kept row's raw target cell was missing.
fn raw_target_missing(df: &DataFrame, target: &str, rows: &[usize]) -> Result<Vec<bool>> {
    let Ok(column) = df.column(target) else {
        return Ok(vec![false; rows.len()]);
    };
    let values = to_f64_values(column.as_materialized_series())?;
    Ok(rows.iter().map(|r| values[*r].is_none()).collect())
}

/// Builder for [`Trainer`].
///
/// Created via [`Trainer::builder()`]. Without a [`config()`](Self::config)
/// call the trainer uses [`TrainingConfig::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let trainer = Trainer::builder()
///     .config(config)
///     .on_progress(|update| println!("{}", update.message))
///     .cancellation_token(token)
///     .build();
/// ```
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

impl std::fmt::Debug for TrainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainerBuilder")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

impl TrainerBuilder {
    /// Set the training configuration.
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the progress callback (optional).
    ///
    /// The callback is invoked on the training thread with a
    /// [`ProgressUpdate`] at every stage and for every candidate family.
    ///
    /// # Note
    ///
    /// The callback should execute quickly to avoid blocking training.
    /// For expensive operations (like UI updates), consider using channels.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set the cancellation token (optional).
    ///
    /// The token is polled between stages and between cross-validation fits.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use gradecast_learning::CancellationToken;
    ///
    /// let token = CancellationToken::new();
    /// let trainer = Trainer::builder()
    ///     .cancellation_token(token.clone())
    ///     .build();
    ///
    /// // Later, from another thread:
    /// // token.cancel();
    /// ```
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the trainer. The configuration is validated when a run starts.
    #[must_use]
    pub fn build(self) -> Trainer {
        Trainer {
            config: self.config.unwrap_or_default(),
            progress_callback: self.progress_callback,
            cancellation_token: self.cancellation_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// 20 rows where `score = 3 * hours + 2 * quiz`, ids `s0..s19`.
    fn grades() -> DataFrame {
        let ids: Vec<String> = (0..20).map(|i| format!("s{i}")).collect();
        let hours: Vec<f64> = (0..20).map(|i| (i % 10) as f64 + 1.0).collect();
        let quiz: Vec<f64> = (0..20).map(|i| ((i * 7) % 11) as f64).collect();
        let score: Vec<f64> = hours.iter().zip(&quiz).map(|(h, q)| 3.0 * h + 2.0 * q).collect();
        df![
            "student_id" => ids,
            "hours" => hours,
            "quiz" => quiz,
            "score" => score,
        ]
        .unwrap()
    }

    fn trainer() -> Trainer {
        Trainer::builder()
            .config(TrainingConfig::builder().target_column("score").build().unwrap())
            .build()
    }

    #[test]
    fn test_builder_defaults_config() {
        let trainer = Trainer::builder().build();
        assert_eq!(trainer.config(), &TrainingConfig::default());
    }

    #[test]
    fn test_builder_debug_hides_callback() {
        let builder = Trainer::builder().on_progress(|_| {});
        let debug_str = format!("{:?}", builder);
        assert!(debug_str.contains("TrainerBuilder"));
        assert!(debug_str.contains("<callback>"));
    }

    #[test]
    fn test_non_negative_clamp() {
        assert_eq!(non_negative(array![-3.0, 0.0, 2.5]), array![0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_train_and_evaluate() {
        let result = trainer().train_and_evaluate(&grades()).unwrap();

        assert_eq!(result.target_column, "score");
        assert_eq!(result.feature_names, vec!["student_id", "hours", "quiz"]);
        assert_eq!(result.total_rows, 20);
        assert_eq!(result.test_rows, 4);
        assert_eq!(result.train_rows, 16);
        assert_eq!(result.predictions.actual.len(), 4);
        assert_eq!(result.model_results.len(), 4);
        assert!(result.metrics.r2 > 0.9);
        assert!(result.feature_importance.is_some());
        assert!(result.predictions.predicted.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_too_few_rows() {
        let df = df!["hours" => [1.0, 2.0, 3.0], "score" => [2.0, 4.0, 6.0]].unwrap();
        let err = trainer().train_and_evaluate(&df).unwrap_err();
        assert!(matches!(
            err,
            LearningError::InsufficientData {
                rows: 3,
                required: 10
            }
        ));
    }

    #[test]
    fn test_only_target_survives() {
        let df = df!["score" => (0..12).map(|v| v as f64).collect::<Vec<_>>()].unwrap();
        let err = trainer().train_and_evaluate(&df).unwrap_err();
        assert!(matches!(err, LearningError::UnalignableFeatures(_)));
    }

    #[test]
    fn test_cancelled_before_model_selection() {
        let token = CancellationToken::new();
        token.cancel();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);

        let trainer = Trainer::builder()
            .cancellation_token(token)
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build();
        let err = trainer.train_and_evaluate(&grades()).unwrap_err();

        assert!(matches!(err, LearningError::Cancelled));
        let stages = stages.lock().unwrap();
        assert!(!stages.contains(&TrainingStage::ModelSelection));
        assert_eq!(stages.last(), Some(&TrainingStage::Cancelled));
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let trainer = Trainer::builder()
            .on_progress(move |update| sink.lock().unwrap().push(update))
            .build();

        trainer.train_and_evaluate(&grades()).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert!(seen.iter().any(|u| u.current_model.as_deref() == Some("ridge")));
        assert_eq!(seen.last().map(|u| u.stage), Some(TrainingStage::Complete));
    }

    #[test]
    fn test_predict_for_entity_fills_missing_feature() {
        let mut df = grades();
        let quiz: Vec<Option<f64>> = (0..20)
            .map(|i| if i == 19 { None } else { Some(((i * 7) % 11) as f64) })
            .collect();
        df.with_column(Series::new("quiz".into(), quiz)).unwrap();

        let prediction = trainer()
            .predict_for_entity(&df, &EntityQuery::new("student_id", "s19"))
            .unwrap();

        assert_eq!(prediction.key_value, "s19");
        assert_eq!(prediction.matched_rows, 1);
        assert_eq!(prediction.target_column, "score");
        assert!(prediction.predicted.is_finite());
        assert!(prediction.predicted >= 0.0);
    }

    #[test]
    fn test_predict_for_unknown_entity() {
        let err = trainer()
            .predict_for_entity(&grades(), &EntityQuery::new("student_id", "nobody"))
            .unwrap_err();
        assert!(matches!(err, LearningError::EntityNotFound { .. }));
    }

    #[test]
    fn test_predict_table() {
        let mut df = grades();
        let score: Vec<Option<f64>> = df
            .column("score")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, v)| if i == 3 { None } else { v })
            .collect();
        df.with_column(Series::new("score".into(), score)).unwrap();

        let config = TrainingConfig::builder()
            .target_column("score")
            .id_column("student_id")
            .preview_limit(5)
            .build()
            .unwrap();
        let table = Trainer::builder().config(config).build().predict_table(&df).unwrap();

        assert_eq!(table.preview.len(), 5);
        assert_eq!(table.preview[3].actual, None);
        assert_eq!(table.preview[0].id.as_deref(), Some("s0"));
        assert_eq!(table.predicted_missing.len(), 1);
        assert_eq!(table.predicted_missing[0].row, 3);
        assert_eq!(table.diagnostics.residuals.len(), 20);
        assert_eq!(table.diagnostics.top_abs_errors.len(), 10);
        assert!(table.diagnostics.error_by_group.is_none());
    }

    #[test]
    fn test_summarize_inferred_target() {
        let summary = Trainer::builder()
            .build()
            .summarize_target(&grades(), Some("student_id"))
            .unwrap();
        assert_eq!(summary.target_column, "score");
        assert_eq!(summary.entities, Some(20));
        assert_eq!(summary.total_records, 20);
    }
}
