//! Bagged regression trees.

use super::{
    DecisionTreeRegressor, ParamValue, Params, Regressor, check_training_shape, depth_param,
    mean_importances, not_fitted, optional_depth, positive_int, unknown_param,
};
use crate::error::Result;
use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Random forest regressor.
///
/// Each tree is grown on a bootstrap sample drawn with its own generator,
/// seeded from `random_state` plus the tree index, so a fit is reproducible
/// regardless of thread scheduling.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub random_state: u64,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            random_state: 42,
            trees: Vec::new(),
            n_features: 0,
        }
    }
}

impl RandomForestRegressor {
    const NAME: &'static str = "random_forest";

    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            ..Self::default()
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Regressor for RandomForestRegressor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(Self::NAME, x, y)?;
        let n_samples = x.nrows();

        let trees: Vec<DecisionTreeRegressor> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTreeRegressor> {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(Axis(0), &sample);
                let y_boot = y.select(Axis(0), &sample);

                let mut tree = DecisionTreeRegressor::new().with_max_depth(self.max_depth);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted(Self::NAME));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for predictions in &per_tree {
            total += predictions;
        }
        Ok(total / per_tree.len() as f64)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = positive_int(Self::NAME, name, value)?,
            "max_depth" => self.max_depth = optional_depth(Self::NAME, name, value)?,
            _ => return Err(unknown_param(Self::NAME, name)),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        Params::from([
            ("n_estimators".to_string(), ParamValue::Int(self.n_estimators)),
            ("max_depth".to_string(), depth_param(self.max_depth)),
        ])
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        mean_importances(
            self.trees.iter().map(|tree| tree.feature_importances()),
            self.n_features,
        )
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}
