//! CART regression tree.

use super::{
    ParamValue, Params, Regressor, check_training_shape, depth_param, invalid_value, not_fitted,
    optional_depth, positive_int, unknown_param,
};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Rows with `x[feature_idx] <= threshold` go left.
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Best split found for one node.
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in the sum of squared errors.
    gain: f64,
}

/// Sum of squared deviations from the mean, from running sums.
fn sse(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sq_sum - sum * sum / count as f64).max(0.0)
}

/// Regression tree grown greedily on squared error.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    /// Maximum depth; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples in each leaf.
    pub min_samples_leaf: usize,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            root: None,
            n_features: 0,
            feature_importances: None,
        }
    }
}

impl DecisionTreeRegressor {
    const NAME: &'static str = "decision_tree";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Depth of the fitted tree.
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let mean = sum / n_samples as f64;

        let pure = indices.iter().all(|&i| y[i] == y[indices[0]]);
        let should_stop = pure
            || n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d);
        if should_stop {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        }

        let Some(split) = self.find_best_split(x, y, indices) else {
            return TreeNode::Leaf {
                value: mean,
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        importances[split.feature_idx] += split.gain;

        let left = Box::new(self.build(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Scan every feature for the split with the largest SSE reduction.
    ///
    /// Ties keep the lower feature index, then the lower threshold.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        if n < 2 {
            return None;
        }
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = sse(n, total_sum, total_sq);
        let min_leaf = self.min_samples_leaf.max(1);

        let per_feature: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;

                for pos in 0..n - 1 {
                    let yi = y[order[pos]];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let left_count = pos + 1;
                    let right_count = n - left_count;
                    if left_count < min_leaf || right_count < min_leaf {
                        continue;
                    }

                    let current = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if current == next {
                        continue;
                    }

                    let gain = parent_sse
                        - sse(left_count, left_sum, left_sq)
                        - sse(right_count, total_sum - left_sum, total_sq - left_sq);
                    if gain > 0.0 && best.is_none_or(|b| gain > b.gain) {
                        let mut threshold = (current + next) / 2.0;
                        if threshold >= next {
                            threshold = current;
                        }
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(b) if candidate.gain <= b.gain => Some(b),
                _ => Some(candidate),
            })
    }
}

impl Regressor for DecisionTreeRegressor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(Self::NAME, x, y)?;

        let n_features = x.ncols();
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = self.build(x, y, &indices, 0, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or_else(|| not_fitted(Self::NAME))?;
        if x.ncols() != self.n_features {
            return Err(LearningError::InvalidData(format!(
                "{}: expected {} features, got {}",
                Self::NAME,
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = optional_depth(Self::NAME, name, value)?,
            "min_samples_split" => {
                let v = positive_int(Self::NAME, name, value)?;
                if v < 2 {
                    return Err(invalid_value(Self::NAME, name, value));
                }
                self.min_samples_split = v;
            }
            "min_samples_leaf" => self.min_samples_leaf = positive_int(Self::NAME, name, value)?,
            _ => return Err(unknown_param(Self::NAME, name)),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        Params::from([
            ("max_depth".to_string(), depth_param(self.max_depth)),
            (
                "min_samples_split".to_string(),
                ParamValue::Int(self.min_samples_split),
            ),
            (
                "min_samples_leaf".to_string(),
                ParamValue::Int(self.min_samples_leaf),
            ),
        ])
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_step_function_is_learned_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), Some(1));
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.predict(&array![[6.5], [6.6]]).unwrap(), array![5.0, 20.0]);
    }

    #[test]
    fn test_importance_goes_to_informative_feature() {
        let x = array![
            [0.0, 3.0],
            [0.0, 1.0],
            [1.0, 2.0],
            [1.0, 1.0],
            [0.0, 2.0],
            [1.0, 3.0]
        ];
        let y = array![1.0, 1.0, 9.0, 9.0, 1.0, 9.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances, array![1.0, 0.0]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut stump = DecisionTreeRegressor::new().with_max_depth(Some(1));
        stump.fit(&x, &y).unwrap();
        assert_eq!(stump.depth(), Some(1));
        assert_eq!(stump.predict(&array![[1.0], [8.0]]).unwrap(), array![2.5, 6.5]);

        let mut full = DecisionTreeRegressor::new();
        full.fit(&x, &y).unwrap();
        assert_eq!(full.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let y = array![7.0, 7.0, 7.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), Some(0));
        assert_eq!(tree.feature_importances().unwrap(), array![0.0, 0.0]);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 0.0, 100.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.set_param("min_samples_leaf", ParamValue::Int(2)).unwrap();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&array![[4.0]]).unwrap(), array![50.0]);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut tree = DecisionTreeRegressor::new();
        assert!(tree.set_param("min_samples_split", ParamValue::Int(1)).is_err());
        assert!(tree.set_param("max_depth", ParamValue::Float(2.0)).is_err());
        assert!(tree.set_param("criterion", ParamValue::None).is_err());
    }
}
