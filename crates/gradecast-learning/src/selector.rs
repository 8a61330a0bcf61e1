//! Cross-validated model selection over the candidate catalog.
//!
//! Each family is scored at its defaults, then tuned one hyperparameter at a
//! time: every grid value of the first parameter is cross-validated, the best
//! one is kept, and the next parameter is swept with it in place. The family
//! with the highest final mean R² wins; on equal scores the family listed
//! first in [`ModelFamily::CATALOG`] is kept.

use crate::cancellation::{CancellationToken, check_cancelled};
use crate::cv::{CvScore, KFold, compare_scores, cross_val_score};
use crate::error::{LearningError, Result};
use crate::models::{ModelFamily, Params, Regressor};
use crate::progress::ProgressReporter;
use crate::types::FeatureImportance;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Cross-validation summary for one candidate family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyResult {
    pub family: ModelFamily,
    /// Mean R² with default hyperparameters.
    pub baseline_mean: f64,
    pub baseline_std: f64,
    /// Mean R² at the end of the last sweep (equal to the baseline when the
    /// family has no grid).
    pub tuned_mean: f64,
    pub tuned_std: f64,
    /// Score compared across families.
    pub final_score: f64,
    /// Chosen value for every swept parameter.
    pub params: Params,
}

/// Outcome of [`ModelSelector::select_best_model`].
#[derive(Debug, Clone)]
pub struct Selection {
    /// Winning model, fitted on the whole training split.
    pub best_model: Box<dyn Regressor>,
    pub best_family: ModelFamily,
    /// One entry per family that could be evaluated, in catalog order.
    pub results: Vec<FamilyResult>,
    pub best_params: Params,
    /// One message per family that failed and was skipped.
    pub warnings: Vec<String>,
}

/// Runs the candidate catalog against a training split.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    families: Vec<ModelFamily>,
    kfold: KFold,
    random_state: u64,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(5, 42)
    }
}

impl ModelSelector {
    pub fn new(cv_folds: usize, random_state: u64) -> Self {
        Self {
            families: ModelFamily::CATALOG.to_vec(),
            kfold: KFold::new(cv_folds),
            random_state,
        }
    }

    /// Restrict the catalog, keeping the given order.
    pub fn with_families(mut self, families: impl IntoIterator<Item = ModelFamily>) -> Self {
        self.families = families.into_iter().collect();
        self
    }

    pub fn families(&self) -> &[ModelFamily] {
        &self.families
    }

    /// Evaluate every family and return the best one fitted on `(x, y)`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InsufficientData`] if there are fewer rows than folds
    /// - [`LearningError::Cancelled`] if the token is cancelled between fits
    /// - [`LearningError::TrainingFailed`] if no family could be evaluated
    pub fn select_best_model(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Selection> {
        self.select_with_progress(x, y, cancel, ProgressReporter::new(None), (0.0, 1.0))
    }

    pub(crate) fn select_with_progress(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: Option<&CancellationToken>,
        progress: ProgressReporter<'_>,
        span: (f64, f64),
    ) -> Result<Selection> {
        if x.nrows() < self.kfold.n_splits() {
            return Err(LearningError::InsufficientData {
                rows: x.nrows(),
                required: self.kfold.n_splits(),
            });
        }

        let total = self.families.len();
        let mut results = Vec::with_capacity(total);
        let mut warnings = Vec::new();
        let mut best: Option<(Box<dyn Regressor>, FamilyResult)> = None;

        for (idx, family) in self.families.iter().enumerate() {
            check_cancelled(cancel)?;
            let fraction = span.0 + (span.1 - span.0) * idx as f64 / total.max(1) as f64;
            progress.model(family.as_str(), idx, total, fraction);

            let (model, result) = match self.evaluate_family(*family, x, y, cancel) {
                Ok(evaluated) => evaluated,
                Err(LearningError::Cancelled) => return Err(LearningError::Cancelled),
                Err(e) => {
                    warn!("Skipping {family}: {e}");
                    warnings.push(format!("{family} skipped: {e}"));
                    continue;
                }
            };

            info!(
                "{family}: baseline R² {:.4} ± {:.4}, final {:.4}",
                result.baseline_mean, result.baseline_std, result.final_score
            );

            let improves = best.as_ref().is_none_or(|(_, current)| {
                compare_scores(result.final_score, current.final_score) == Ordering::Greater
            });
            if improves {
                best = Some((model, result.clone()));
            }
            results.push(result);
        }

        let (best_model, best_result) = best.ok_or_else(|| {
            LearningError::TrainingFailed("no candidate model could be evaluated".to_string())
        })?;

        info!(
            "Selected {} (CV R² {:.4})",
            best_result.family, best_result.final_score
        );

        Ok(Selection {
            best_model,
            best_family: best_result.family,
            results,
            best_params: best_result.params,
            warnings,
        })
    }

    fn evaluate_family(
        &self,
        family: ModelFamily,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Box<dyn Regressor>, FamilyResult)> {
        let mut model = family.build(self.random_state);
        let baseline = cross_val_score(model.as_ref(), x, y, self.kfold, cancel)?;

        let mut tuned = baseline.clone();
        let mut params = Params::new();

        for (name, values) in family.param_grid() {
            let mut best_for_param: Option<(_, CvScore)> = None;

            for value in values {
                let mut candidate = model.boxed_clone();
                candidate.set_param(name, value)?;
                let score = cross_val_score(candidate.as_ref(), x, y, self.kfold, cancel)?;
                debug!("{family} {name}={value}: R² {:.4}", score.mean);

                let improves = best_for_param.as_ref().is_none_or(|(_, current)| {
                    compare_scores(score.mean, current.mean) == Ordering::Greater
                });
                if improves {
                    best_for_param = Some((value, score));
                }
            }

            if let Some((value, score)) = best_for_param {
                model.set_param(name, value)?;
                params.insert(name.to_string(), value);
                tuned = score;
            }
        }

        check_cancelled(cancel)?;
        model.fit(x, y)?;

        let result = FamilyResult {
            family,
            baseline_mean: baseline.mean,
            baseline_std: baseline.std,
            tuned_mean: tuned.mean,
            tuned_std: tuned.std,
            final_score: tuned.mean,
            params,
        };
        Ok((model, result))
    }
}

/// Rank features by the model's native importances, or by absolute
/// coefficients for linear models.
///
/// Sorted descending; equal importances keep feature order. `None` when the
/// model exposes neither or the lengths disagree.
pub fn get_feature_importance(
    model: &dyn Regressor,
    feature_names: &[String],
) -> Option<Vec<FeatureImportance>> {
    let values = model
        .feature_importances()
        .or_else(|| model.coefficients().map(|c| c.mapv(f64::abs)))?;
    if values.len() != feature_names.len() {
        return None;
    }

    let mut ranked: Vec<FeatureImportance> = feature_names
        .iter()
        .zip(values.iter())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| compare_scores(b.importance, a.importance));
    Some(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinearRegression, ParamValue, RandomForestRegressor};
    use pretty_assertions::assert_eq;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 13) % 7) as f64 }
        });
        let y: Array1<f64> = x.rows().into_iter().map(|r| 3.0 * r[0] + r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_linear_family_wins_on_linear_data() {
        let (x, y) = linear_data();
        let selection = ModelSelector::default()
            .with_families([ModelFamily::LinearRegression, ModelFamily::Ridge])
            .select_best_model(&x, &y, None)
            .unwrap();

        assert_eq!(selection.best_family, ModelFamily::LinearRegression);
        assert!(selection.best_params.is_empty());
        assert_eq!(selection.results.len(), 2);

        let ridge = &selection.results[1];
        assert_eq!(ridge.family, ModelFamily::Ridge);
        assert!(ridge.params.contains_key("alpha"));
        assert_eq!(ridge.final_score, ridge.tuned_mean);

        let predictions = selection.best_model.predict(&x).unwrap();
        assert!((predictions[5] - y[5]).abs() < 1e-6);
    }

    #[test]
    fn test_linear_family_reports_baseline_as_tuned() {
        let (x, y) = linear_data();
        let selection = ModelSelector::default()
            .with_families([ModelFamily::LinearRegression])
            .select_best_model(&x, &y, None)
            .unwrap();

        let result = &selection.results[0];
        assert_eq!(result.baseline_mean, result.tuned_mean);
        assert_eq!(result.baseline_std, result.tuned_std);
        assert_eq!(result.params, Params::new());
    }

    #[test]
    fn test_tuned_forest_reports_every_swept_param() {
        let (x, y) = linear_data();
        let selection = ModelSelector::new(3, 42)
            .with_families([ModelFamily::RandomForest])
            .select_best_model(&x, &y, None)
            .unwrap();

        let keys: Vec<&str> = selection.best_params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["max_depth", "n_estimators"]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (x, y) = linear_data();
        let selector = ModelSelector::new(3, 42)
            .with_families([ModelFamily::Ridge, ModelFamily::GradientBoosting]);

        let first = selector.select_best_model(&x, &y, None).unwrap();
        let second = selector.select_best_model(&x, &y, None).unwrap();

        assert_eq!(first.best_family, second.best_family);
        assert_eq!(first.best_params, second.best_params);
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_too_few_rows() {
        let x = Array2::zeros((4, 1));
        let y = Array1::zeros(4);
        let err = ModelSelector::default()
            .select_best_model(&x, &y, None)
            .unwrap_err();
        assert!(matches!(err, LearningError::InsufficientData { rows: 4, required: 5 }));
    }

    #[test]
    fn test_cancelled_selection() {
        let (x, y) = linear_data();
        let token = CancellationToken::new();
        token.cancel();

        let err = ModelSelector::default()
            .select_best_model(&x, &y, Some(&token))
            .unwrap_err();
        assert!(matches!(err, LearningError::Cancelled));
    }

    #[test]
    fn test_importance_from_coefficients() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| ((i + 1) * (j + 2) % 7) as f64 + j as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| -4.0 * r[0] + 0.5 * r[2]).collect();

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = get_feature_importance(&model, &names).unwrap();
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order[0], "a");
        assert!((ranked[0].importance - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_importance_ties_keep_feature_order() {
        let x = Array2::from_shape_fn((12, 2), |(i, _)| i as f64);
        let y = x.column(0).to_owned();

        let mut forest = RandomForestRegressor::new(5);
        forest.set_param("max_depth", ParamValue::Int(1)).unwrap();
        forest.fit(&x, &y).unwrap();

        let names = vec!["first".to_string(), "second".to_string()];
        let ranked = get_feature_importance(&forest, &names).unwrap();
        assert_eq!(ranked[0].feature, "first");
        assert_eq!(ranked[0].importance, 1.0);
    }

    #[test]
    fn test_importance_requires_matching_names() {
        let unfitted = LinearRegression::default();
        assert!(get_feature_importance(&unfitted, &["a".to_string()]).is_none());
    }
}
