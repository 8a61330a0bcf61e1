//! Gradient boosted regression trees on squared loss.

use super::{
    DecisionTreeRegressor, ParamValue, Params, Regressor, check_training_shape, depth_param,
    mean_importances, not_fitted, optional_depth, positive_float, positive_int, unknown_param,
};
use crate::error::Result;
use ndarray::{Array1, Array2};

/// Gradient boosting regressor.
///
/// Starts from the target mean and adds shallow trees fitted to the current
/// residuals, each scaled by `learning_rate`. There is no row or column
/// subsampling, so fits are deterministic.
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: Option<usize>,
    initial_prediction: f64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
    fitted: bool,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            initial_prediction: 0.0,
            trees: Vec::new(),
            n_features: 0,
            fitted: false,
        }
    }
}

impl GradientBoostingRegressor {
    const NAME: &'static str = "gradient_boosting";

    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            ..Self::default()
        }
    }

    /// Number of boosting rounds actually fitted.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(Self::NAME, x, y)?;

        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals = y - &predictions;
            if residuals.iter().all(|r| *r == 0.0) {
                break;
            }

            let mut tree = DecisionTreeRegressor::new().with_max_depth(self.max_depth);
            tree.fit(x, &residuals)?;
            predictions.scaled_add(self.learning_rate, &tree.predict(x)?);
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = x.ncols();
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(not_fitted(Self::NAME));
        }

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = positive_int(Self::NAME, name, value)?,
            "learning_rate" => self.learning_rate = positive_float(Self::NAME, name, value)?,
            "max_depth" => self.max_depth = optional_depth(Self::NAME, name, value)?,
            _ => return Err(unknown_param(Self::NAME, name)),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        Params::from([
            ("n_estimators".to_string(), ParamValue::Int(self.n_estimators)),
            ("learning_rate".to_string(), ParamValue::Float(self.learning_rate)),
            ("max_depth".to_string(), depth_param(self.max_depth)),
        ])
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if !self.fitted {
            return None;
        }
        if self.trees.is_empty() {
            return Some(Array1::zeros(self.n_features));
        }
        mean_importances(
            self.trees.iter().map(|tree| tree.feature_importances()),
            self.n_features,
        )
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::r2_score;
    use ndarray::array;

    #[test]
    fn test_boosting_fits_nonlinear_target() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| (v - 15.0).powi(2));

        let mut model = GradientBoostingRegressor::default();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert!(r2_score(y.view(), predictions.view()) > 0.95);
    }

    #[test]
    fn test_learning_rate_scales_first_round() {
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 10.0, 10.0];

        let mut model = GradientBoostingRegressor::new(1, 0.5);
        model.fit(&x, &y).unwrap();

        // mean 5, residuals ±5, half a step each way
        assert_eq!(model.predict(&x).unwrap(), array![2.5, 2.5, 7.5, 7.5]);
    }

    #[test]
    fn test_constant_target_stops_early() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];

        let mut model = GradientBoostingRegressor::default();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 0);
        assert_eq!(model.predict(&array![[9.0]]).unwrap(), array![4.0]);
        assert_eq!(model.feature_importances().unwrap(), array![0.0]);
    }

    #[test]
    fn test_params_include_depth() {
        let params = GradientBoostingRegressor::default().params();
        assert_eq!(params["max_depth"], ParamValue::Int(3));
        assert_eq!(params["learning_rate"], ParamValue::Float(0.1));
    }
}
