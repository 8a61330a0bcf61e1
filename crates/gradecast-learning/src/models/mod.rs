//! Native regression models and the candidate catalog.
//!
//! Every model implements [`Regressor`], so the selector can cross-validate,
//! tune and refit them without knowing the concrete type.

mod boosting;
mod forest;
mod linear;
mod tree;

pub use boosting::GradientBoostingRegressor;
pub use forest::RandomForestRegressor;
pub use linear::{LinearRegression, Ridge};
pub use tree::DecisionTreeRegressor;

use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A hyperparameter value.
///
/// Serializes untagged, so `None` (an unbounded depth) becomes JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(usize),
    Float(f64),
    None,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::None => f.write_str("None"),
        }
    }
}

/// Hyperparameter values keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

/// A regression model that can be fitted, tuned and cloned behind a trait object.
pub trait Regressor: fmt::Debug + Send + Sync {
    /// Short snake_case name of the model family.
    fn name(&self) -> &'static str;

    /// Fit the model on a feature matrix and target vector.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict targets for every row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set a hyperparameter. Fitted state is kept until the next `fit`.
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Current hyperparameter values.
    fn params(&self) -> Params;

    /// Impurity-based importances, for tree models.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Fitted coefficients, for linear models.
    fn coefficients(&self) -> Option<Array1<f64>> {
        None
    }

    fn boxed_clone(&self) -> Box<dyn Regressor>;
}

impl Clone for Box<dyn Regressor> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// The candidate model families, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LinearRegression,
    Ridge,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    /// All families in the order they are evaluated.
    pub const CATALOG: [ModelFamily; 4] = [
        Self::LinearRegression,
        Self::Ridge,
        Self::RandomForest,
        Self::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::Ridge => "ridge",
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
        }
    }

    /// A model of this family with default hyperparameters.
    ///
    /// `random_state` seeds the forest bootstrap; the other families are
    /// deterministic.
    pub fn build(&self, random_state: u64) -> Box<dyn Regressor> {
        match self {
            Self::LinearRegression => Box::new(LinearRegression::default()),
            Self::Ridge => Box::new(Ridge::default()),
            Self::RandomForest => {
                Box::new(RandomForestRegressor::default().with_random_state(random_state))
            }
            Self::GradientBoosting => Box::new(GradientBoostingRegressor::default()),
        }
    }

    /// Hyperparameter grid, swept one parameter at a time in this order.
    pub fn param_grid(&self) -> Vec<(&'static str, Vec<ParamValue>)> {
        use ParamValue::{Float, Int, None};
        match self {
            Self::LinearRegression => Vec::new(),
            Self::Ridge => vec![("alpha", vec![Float(0.1), Float(1.0), Float(10.0)])],
            Self::RandomForest => vec![
                ("n_estimators", vec![Int(50), Int(100), Int(200)]),
                ("max_depth", vec![None, Int(10), Int(20)]),
            ],
            Self::GradientBoosting => vec![
                ("n_estimators", vec![Int(50), Int(100), Int(200)]),
                ("learning_rate", vec![Float(0.01), Float(0.1), Float(0.3)]),
            ],
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parameter helpers shared by the models
// ============================================================================

fn unknown_param(model: &str, name: &str) -> LearningError {
    LearningError::InvalidConfig(format!("{model} has no hyperparameter '{name}'"))
}

fn invalid_value(model: &str, name: &str, value: ParamValue) -> LearningError {
    LearningError::InvalidConfig(format!("invalid value {value} for {model}.{name}"))
}

fn positive_float(model: &str, name: &str, value: ParamValue) -> Result<f64> {
    match value {
        ParamValue::Float(v) if v.is_finite() && v > 0.0 => Ok(v),
        ParamValue::Int(v) if v > 0 => Ok(v as f64),
        other => Err(invalid_value(model, name, other)),
    }
}

fn positive_int(model: &str, name: &str, value: ParamValue) -> Result<usize> {
    match value {
        ParamValue::Int(v) if v > 0 => Ok(v),
        other => Err(invalid_value(model, name, other)),
    }
}

fn optional_depth(model: &str, name: &str, value: ParamValue) -> Result<Option<usize>> {
    match value {
        ParamValue::None => Ok(None),
        other => positive_int(model, name, other).map(Some),
    }
}

fn depth_param(depth: Option<usize>) -> ParamValue {
    depth.map_or(ParamValue::None, ParamValue::Int)
}

/// Check that `x` and `y` agree on the number of rows and are non-empty.
fn check_training_shape(model: &str, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(LearningError::InvalidData(format!(
            "{model}: {} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(LearningError::InvalidData(format!(
            "{model}: cannot fit on zero rows"
        )));
    }
    Ok(())
}

fn not_fitted(model: &str) -> LearningError {
    LearningError::InvalidData(format!("{model} has not been fitted"))
}

/// Average per-model importances and renormalize them to sum to one.
fn mean_importances(
    per_model: impl Iterator<Item = Option<Array1<f64>>>,
    n_features: usize,
) -> Option<Array1<f64>> {
    let mut total = Array1::<f64>::zeros(n_features);
    let mut count = 0usize;
    for importances in per_model.flatten() {
        total += &importances;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_serializes_untagged() {
        let params: Params = [
            ("max_depth".to_string(), ParamValue::None),
            ("n_estimators".to_string(), ParamValue::Int(100)),
            ("learning_rate".to_string(), ParamValue::Float(0.1)),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(
            json,
            r#"{"learning_rate":0.1,"max_depth":null,"n_estimators":100}"#
        );
    }

    #[test]
    fn test_catalog_order_and_grids() {
        let names: Vec<&str> = ModelFamily::CATALOG.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            names,
            vec!["linear_regression", "ridge", "random_forest", "gradient_boosting"]
        );
        assert!(ModelFamily::LinearRegression.param_grid().is_empty());

        let forest: Vec<&str> = ModelFamily::RandomForest
            .param_grid()
            .iter()
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(forest, vec!["n_estimators", "max_depth"]);
    }

    #[test]
    fn test_built_models_accept_their_grid() {
        for family in ModelFamily::CATALOG {
            let mut model = family.build(42);
            assert_eq!(model.name(), family.as_str());
            for (name, values) in family.param_grid() {
                for value in values {
                    model.set_param(name, value).unwrap();
                    assert_eq!(model.params()[name], value);
                }
            }
        }
    }

    #[test]
    fn test_unknown_param_is_rejected() {
        let mut model = ModelFamily::Ridge.build(42);
        assert!(model.set_param("gamma", ParamValue::Float(1.0)).is_err());
        assert!(model.set_param("alpha", ParamValue::None).is_err());
    }

    #[test]
    fn test_mean_importances_renormalizes() {
        let per_model = vec![
            Some(Array1::from(vec![1.0, 0.0])),
            Some(Array1::from(vec![0.5, 0.5])),
            None,
        ];
        let mean = mean_importances(per_model.into_iter(), 2).unwrap();
        assert!((mean[0] - 0.75).abs() < 1e-12);
        assert!((mean[1] - 0.25).abs() < 1e-12);
    }
}
