//! Feature matrix construction and the train/test split.

use crate::error::{LearningError, Result};
use polars::prelude::ChunkAgg;
use gradecast_processing::PreprocessedTable;
use gradecast_processing::utils::present_f64;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Numeric features and target taken from a preprocessed table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub target_column: String,
    /// Every column except the target, in table order.
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Mean of each feature over its present values, `0.0` when it has none.
    /// Used to fill missing cells here and when aligning new rows.
    pub feature_means: Vec<f64>,
}

impl Dataset {
    /// Build the matrix from `table` with `target` as the response.
    ///
    /// # Errors
    ///
    /// - [`LearningError::UnalignableFeatures`] if no column besides the target remains
    /// - [`LearningError::InvalidData`] if the target still has missing cells
    pub fn from_table(table: &PreprocessedTable, target: &str) -> Result<Self> {
        let feature_names: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| *name != target)
            .map(str::to_string)
            .collect();
        if feature_names.is_empty() {
            return Err(LearningError::UnalignableFeatures(format!(
                "no feature columns remain besides the target '{target}'"
            )));
        }

        let target_values = table.column_values(target)?;
        let missing = target_values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(LearningError::InvalidData(format!(
                "target column '{target}' has {missing} missing values after preprocessing"
            )));
        }
        let y: Array1<f64> = target_values.into_iter().flatten().collect();

        let n_rows = table.height();
        let mut x = Array2::<f64>::zeros((n_rows, feature_names.len()));
        let mut feature_means = Vec::with_capacity(feature_names.len());

        for (j, name) in feature_names.iter().enumerate() {
            let values = table.column_values(name)?;
            let fill = present_f64(name, &values).mean().unwrap_or(0.0);
            for (i, value) in values.iter().enumerate() {
                x[[i, j]] = value.unwrap_or(fill);
            }
            feature_means.push(fill);
        }

        debug!(
            "Feature matrix: {} rows x {} features, target '{}'",
            n_rows,
            feature_names.len(),
            target
        );

        Ok(Self {
            target_column: target.to_string(),
            feature_names,
            x,
            y,
            feature_means,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Turn a row of optional feature values into a 1-row matrix, filling
    /// missing cells with the feature means.
    pub fn align_row(&self, values: &[Option<f64>]) -> Result<Array2<f64>> {
        if values.len() != self.feature_names.len() {
            return Err(LearningError::UnalignableFeatures(format!(
                "expected {} feature values, got {}",
                self.feature_names.len(),
                values.len()
            )));
        }
        let filled: Vec<f64> = values
            .iter()
            .zip(&self.feature_means)
            .map(|(value, fill)| value.unwrap_or(*fill))
            .collect();
        Ok(Array1::from_vec(filled).insert_axis(Axis(0)))
    }

    /// Split rows into train and test sets.
    pub fn split(&self, test_size: f64, seed: u64) -> TrainTestSplit {
        let (train_indices, test_indices) = train_test_indices(self.n_rows(), test_size, seed);
        TrainTestSplit {
            x_train: self.x.select(Axis(0), &train_indices),
            y_train: self.y.select(Axis(0), &train_indices),
            x_test: self.x.select(Axis(0), &test_indices),
            y_test: self.y.select(Axis(0), &test_indices),
            train_indices,
            test_indices,
        }
    }
}

/// Rows of a [`Dataset`] divided for evaluation.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle `0..n` with a seeded ChaCha8 generator and hold out
/// `ceil(n * test_size)` rows.
///
/// `test_size` must already be within `(0, 1)`. At least one row stays in the
/// training set when `n > 0`.
pub fn train_test_indices(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_size).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(n_test);
    (train, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradecast_processing::Preprocessor;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn table() -> PreprocessedTable {
        let raw = df![
            "hours" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            "empty" => [None::<f64>, None, None, None],
            "score" => [10.0, 20.0, 30.0, 40.0],
        ]
        .unwrap();
        Preprocessor::default().preprocess(&raw).unwrap()
    }

    #[test]
    fn test_all_missing_feature_is_zero_filled() {
        let dataset = Dataset::from_table(&table(), "score").unwrap();

        assert_eq!(dataset.feature_names, vec!["hours", "empty"]);
        assert_eq!(dataset.feature_means, vec![2.5, 0.0]);
        assert_eq!(dataset.x.column(1).to_vec(), vec![0.0; 4]);
        assert_eq!(dataset.y.to_vec(), vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_align_row_fills_with_means() {
        let dataset = Dataset::from_table(&table(), "score").unwrap();
        let row = dataset.align_row(&[None, None]).unwrap();
        assert_eq!(row.shape(), &[1, 2]);
        assert_eq!(row.row(0).to_vec(), vec![2.5, 0.0]);

        assert!(matches!(
            dataset.align_row(&[Some(1.0)]),
            Err(LearningError::UnalignableFeatures(_))
        ));
    }

    #[test]
    fn test_only_target_column() {
        let raw = df!["score" => [1.0, 2.0]].unwrap();
        let table = Preprocessor::default().preprocess(&raw).unwrap();
        let err = Dataset::from_table(&table, "score").unwrap_err();
        assert!(matches!(err, LearningError::UnalignableFeatures(_)));
    }

    #[test]
    fn test_missing_target_is_invalid() {
        let err = Dataset::from_table(&table(), "empty").unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let (train, test) = train_test_indices(11, 0.2, 42);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());

        assert_eq!(train_test_indices(11, 0.2, 42), (train, test));
    }

    #[test]
    fn test_split_keeps_a_training_row() {
        let (train, test) = train_test_indices(2, 0.9, 42);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }
}
