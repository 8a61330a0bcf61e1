//! K-fold cross-validation.

use crate::cancellation::{CancellationToken, check_cancelled};
use crate::error::{LearningError, Result};
use crate::metrics::r2_score;
use crate::models::Regressor;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One train/test split of row indices.
#[derive(Debug, Clone, PartialEq)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Contiguous, unshuffled k-fold splitter.
///
/// The first `n % k` folds get one extra row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CvSplit>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(LearningError::InvalidConfig(format!(
                "cross-validation needs at least 2 folds, got {k}"
            )));
        }
        if n_samples < k {
            return Err(LearningError::InsufficientData {
                rows: n_samples,
                required: k,
            });
        }

        let base = n_samples / k;
        let extra = n_samples % k;
        let mut splits = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            splits.push(CvSplit {
                train_indices: (0..start).chain(end..n_samples).collect(),
                test_indices: (start..end).collect(),
            });
            start = end;
        }
        Ok(splits)
    }
}

/// Per-fold R² scores with their mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScore {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Total order on scores where NaN ranks below everything.
pub fn compare_scores(a: f64, b: f64) -> Ordering {
    let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
    key(a).total_cmp(&key(b))
}

/// Cross-validate a fresh copy of `model` on each fold and score by R².
///
/// The token is polled before every fold.
pub fn cross_val_score(
    model: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
    kfold: KFold,
    cancel: Option<&CancellationToken>,
) -> Result<CvScore> {
    let splits = kfold.split(x.nrows())?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in &splits {
        check_cancelled(cancel)?;

        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut fold_model = model.boxed_clone();
        fold_model.fit(&x_train, &y_train)?;
        let predictions = fold_model.predict(&x_test)?;
        scores.push(r2_score(y_test.view(), predictions.view()));
    }

    Ok(CvScore::from_scores(scores))
}
