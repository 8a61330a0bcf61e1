//! Linear least squares models.

use super::{
    ParamValue, Params, Regressor, check_training_shape, not_fitted, positive_float,
    unknown_param,
};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, Axis};

/// Solve the symmetric system `a · x = b` by Cholesky decomposition.
///
/// A matrix that is not positive definite is retried once with a small
/// diagonal jitter, which is enough for collinear or constant features.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve_inner(a, b) {
        return Some(x);
    }

    let n = a.nrows();
    let mean_diag = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let jitter = if mean_diag > 0.0 { 1e-8 * mean_diag } else { 1e-8 };
    let mut regularized = a.clone();
    for k in 0..n {
        regularized[[k, k]] += jitter;
    }
    cholesky_solve_inner(&regularized, b)
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L · z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ · x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            aug[[r1, col]].abs().total_cmp(&aug[[r2, col]].abs())
        })?;
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Fit `y ≈ x · w + b` on centered data with `alpha` added to the diagonal
/// of `xᵀx`. Returns `(w, b)`.
fn fit_centered(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<(Array1<f64>, f64)> {
    let n_features = x.ncols();
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(n_features));
    let y_mean = y.mean().unwrap_or(0.0);

    let x_c = x - &x_mean.view().insert_axis(Axis(0));
    let y_c = y - y_mean;

    let mut xtx = x_c.t().dot(&x_c);
    for i in 0..n_features {
        xtx[[i, i]] += alpha;
    }
    let xty = x_c.t().dot(&y_c);

    let coefficients = cholesky_solve(&xtx, &xty)
        .or_else(|| gauss_jordan_solve(&xtx, &xty))
        .ok_or_else(|| {
            LearningError::TrainingFailed("normal equations are singular".to_string())
        })?;
    let intercept = y_mean - coefficients.dot(&x_mean);
    Ok((coefficients, intercept))
}

/// Fitted linear weights.
#[derive(Debug, Clone, PartialEq)]
struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearFit {
    fn predict(&self, model: &str, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(LearningError::InvalidData(format!(
                "{model}: expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

// ============================================================================
// Ordinary least squares
// ============================================================================

/// Ordinary least squares with intercept.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    fitted: Option<LinearFit>,
}

impl LinearRegression {
    const NAME: &'static str = "linear_regression";

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(Self::NAME, x, y)?;
        let (coefficients, intercept) = fit_centered(x, y, 0.0)?;
        self.fitted = Some(LinearFit {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted
            .as_ref()
            .ok_or_else(|| not_fitted(Self::NAME))?
            .predict(Self::NAME, x)
    }

    fn set_param(&mut self, name: &str, _value: ParamValue) -> Result<()> {
        Err(unknown_param(Self::NAME, name))
    }

    fn params(&self) -> Params {
        Params::new()
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|f| f.coefficients.clone())
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Ridge
// ============================================================================

/// L2-regularized least squares with intercept.
#[derive(Debug, Clone)]
pub struct Ridge {
    /// Regularization strength added to the diagonal of `xᵀx`.
    pub alpha: f64,
    fitted: Option<LinearFit>,
}

impl Default for Ridge {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Ridge {
    const NAME: &'static str = "ridge";

    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for Ridge {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(Self::NAME, x, y)?;
        let (coefficients, intercept) = fit_centered(x, y, self.alpha)?;
        self.fitted = Some(LinearFit {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted
            .as_ref()
            .ok_or_else(|| not_fitted(Self::NAME))?
            .predict(Self::NAME, x)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "alpha" => {
                self.alpha = match value {
                    ParamValue::Float(v) if v == 0.0 => 0.0,
                    other => positive_float(Self::NAME, name, other)?,
                };
                Ok(())
            }
            _ => Err(unknown_param(Self::NAME, name)),
        }
    }

    fn params(&self) -> Params {
        Params::from([("alpha".to_string(), ParamValue::Float(self.alpha))])
    }

    fn coefficients(&self) -> Option<Array1<f64>> {
        self.fitted.as_ref().map(|f| f.coefficients.clone())
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
    fn test_ols_recovers_exact_line() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| 3.0 * r[0] - 2.0 * r[1] + 1.0)
            .collect();

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let coefficients = model.coefficients().unwrap();
        assert!((coefficients[0] - 3.0).abs() < 1e-9);
        assert!((coefficients[1] + 2.0).abs() < 1e-9);
        assert!((model.intercept().unwrap() - 1.0).abs() < 1e-9);

        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ols_tolerates_collinear_and_constant_features() {
        let x = array![[1.0, 2.0, 5.0], [2.0, 4.0, 5.0], [3.0, 6.0, 5.0], [4.0, 8.0, 5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4, "prediction {p} vs {t}");
        }
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut weak = Ridge::new(0.1);
        let mut strong = Ridge::new(10.0);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let weak_coef = weak.coefficients().unwrap()[0];
        let strong_coef = strong.coefficients().unwrap()[0];
        // centered xᵀx = 5, xᵀy = 10
        assert!((weak_coef - 10.0 / 5.1).abs() < 1e-12);
        assert!((strong_coef - 10.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = Ridge::default();
        assert!(model.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_feature_count_mismatch() {
        let mut model = LinearRegression::default();
        model
            .fit(&array![[1.0], [2.0], [3.0]], &array![1.0, 2.0, 3.0])
            .unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_gauss_jordan_solves_small_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = gauss_jordan_solve(&a, &b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }
}
