//! Result types returned by the [`Trainer`](crate::Trainer).
//!
//! # Overview
//!
//! - [`TrainingResult`]: held-out evaluation of the selected model
//! - [`EntityPrediction`]: prediction for one entity's latest row
//! - [`TablePrediction`]: predictions for every row, with diagnostics
//! - [`FeatureImportance`]: one entry of a ranked importance list
//!
//! All of them serialize to JSON for an HTTP layer.
//!
//! # Example
//!
//! ```ignore
//! let result = trainer.train_and_evaluate(&df)?;
//!
//! println!("Best model: {} (r2 {:.3})", result.best_model_name, result.metrics.r2);
//! if let Some(importance) = &result.feature_importance {
//!     for entry in importance.iter().take(3) {
//!         println!("{:>20} {:.3}", entry.feature, entry.importance);
//!     }
//! }
//! ```

use crate::diagnostics::{Diagnostics, PreviewRow};
use crate::metrics::Metrics;
use crate::models::Params;
use crate::selector::FamilyResult;
use serde::{Deserialize, Serialize};

/// Importance of one feature in the fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Held-out targets next to the clamped predictions, in test-split order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

/// Result of [`Trainer::train_and_evaluate`](crate::Trainer::train_and_evaluate).
///
/// Metrics come from the model fitted on the training split. Feature
/// importances come from the same configuration refitted on every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingResult {
    /// Name of the target column, given or inferred.
    pub target_column: String,

    /// Feature columns in matrix order.
    pub feature_names: Vec<String>,

    /// Family of the selected model (e.g., "ridge", "random_forest").
    pub best_model_name: String,

    /// R², MAE and RMSE on the test split.
    pub metrics: Metrics,

    /// Cross-validation outcome of every family that could be fitted, in
    /// catalog order.
    pub model_results: Vec<FamilyResult>,

    /// Hyperparameters chosen for the selected family. Empty for plain
    /// linear regression.
    pub best_params: Params,

    /// Ranked descending. `None` if the model exposes neither importances
    /// nor coefficients.
    pub feature_importance: Option<Vec<FeatureImportance>>,

    pub predictions: Predictions,

    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows after preprocessing.
    pub total_rows: usize,

    /// Wall-clock time from preprocessing to refit.
    pub training_time_seconds: f64,

    /// Non-fatal issues from preprocessing and model selection.
    pub warnings: Vec<String>,

    /// Raw columns dropped because they could not be encoded.
    pub skipped_columns: Vec<String>,
}

/// Result of [`Trainer::predict_for_entity`](crate::Trainer::predict_for_entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPrediction {
    pub key_value: String,
    /// Never negative.
    pub predicted: f64,
    pub target_column: String,
    /// Held-out metrics of the training run behind this prediction.
    pub metrics: Metrics,
    pub feature_importance: Option<Vec<FeatureImportance>>,
    /// How many rows matched the key and filters before the latest was picked.
    pub matched_rows: usize,
}

/// Result of [`Trainer::predict_table`](crate::Trainer::predict_table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePrediction {
    pub target_column: String,
    pub best_model_name: String,
    pub metrics: Metrics,
    /// The first `preview_limit` preprocessed rows.
    pub preview: Vec<PreviewRow>,
    /// Rows whose raw target was missing, at most `preview_limit`.
    pub predicted_missing: Vec<PreviewRow>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;

    #[test]
    fn test_feature_importance_serialization() {
        let entry = FeatureImportance {
            feature: "homework_score".to_string(),
            importance: 0.75,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"feature":"homework_score","importance":0.75}"#);
    }

    #[test]
    fn test_best_params_serialize_none_as_null() {
        let mut params = Params::new();
        params.insert("max_depth".to_string(), ParamValue::None);
        params.insert("n_estimators".to_string(), ParamValue::Int(100));

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"max_depth":null,"n_estimators":100}"#);
    }
}
