//! Linear regression family: ordinary least squares, Lasso, ElasticNet
//!
//! OLS solves the normal equations directly; the regularized variants run
//! cyclic coordinate descent on centered data with the sklearn objective
//! `1/(2n)·||y - Xw||² + α·l1·||w||₁ + α·(1-l1)/2·||w||²`.

use super::{ModelAdapter, Predictor};
use crate::calibration::{HyperGrid, ParamSet, ParamValue};
use crate::config::RunConfig;
use crate::error::{EnsembleError, Result};

const CD_MAX_ITER: usize = 1000;
const CD_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regularization {
    None,
    Lasso,
    ElasticNet,
}

#[derive(Debug, Clone)]
pub struct LinearRegression {
    regularization: Regularization,
    coefficients: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

impl LinearRegression {
    pub fn new(regularization: Regularization) -> Self {
        Self {
            regularization,
            coefficients: Vec::new(),
            intercept: 0.0,
            fitted: false,
        }
    }

    fn fit_ols(&mut self, rows: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let width = rows[0].len();
        let dim = width + 1; // leading intercept column

        let design = |i: usize, j: usize| -> f64 {
            if j == 0 {
                1.0
            } else {
                rows[i][j - 1]
            }
        };

        let mut gram = vec![vec![0.0; dim]; dim];
        let mut moment = vec![0.0; dim];
        for i in 0..rows.len() {
            for j in 0..dim {
                let xj = design(i, j);
                moment[j] += xj * targets[i];
                for k in j..dim {
                    gram[j][k] += xj * design(i, k);
                }
            }
        }
        for j in 0..dim {
            for k in 0..j {
                gram[j][k] = gram[k][j];
            }
        }

        let weights = solve_linear_system(gram, moment)?;
        self.intercept = weights[0];
        self.coefficients = weights[1..].to_vec();
        Ok(())
    }

    fn fit_coordinate_descent(
        &mut self,
        rows: &[Vec<f64>],
        targets: &[f64],
        alpha: f64,
        l1_ratio: f64,
    ) -> Result<()> {
        if !(alpha >= 0.0) {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "alpha must be non-negative, got {}",
                alpha
            )));
        }
        if !(0.0..=1.0).contains(&l1_ratio) {
            return Err(EnsembleError::InvalidConfiguration(format!(
                "l1_ratio must be in [0, 1], got {}",
                l1_ratio
            )));
        }

        let n = rows.len();
        let width = rows[0].len();
        let n_f = n as f64;

        let mut column_means = vec![0.0; width];
        for row in rows {
            for (j, &value) in row.iter().enumerate() {
                column_means[j] += value;
            }
        }
        for mean in column_means.iter_mut() {
            *mean /= n_f;
        }
        let target_mean = targets.iter().sum::<f64>() / n_f;

        // centered copies; the coordinate loop touches them column by column
        let centered: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(column_means.iter())
                    .map(|(&v, &m)| v - m)
                    .collect()
            })
            .collect();
        let norms: Vec<f64> = (0..width)
            .map(|j| centered.iter().map(|row| row[j] * row[j]).sum())
            .collect();

        let mut weights = vec![0.0; width];
        let mut residual: Vec<f64> = targets.iter().map(|&y| y - target_mean).collect();

        for _ in 0..CD_MAX_ITER {
            let mut max_delta: f64 = 0.0;
            for j in 0..width {
                if norms[j] == 0.0 {
                    continue;
                }
                let rho: f64 = centered
                    .iter()
                    .zip(residual.iter())
                    .map(|(row, &r)| row[j] * (r + row[j] * weights[j]))
                    .sum::<f64>()
                    / n_f;
                let denom = norms[j] / n_f + alpha * (1.0 - l1_ratio);
                let updated = soft_threshold(rho, alpha * l1_ratio) / denom;
                let delta = updated - weights[j];
                if delta != 0.0 {
                    for (row, r) in centered.iter().zip(residual.iter_mut()) {
                        *r -= row[j] * delta;
                    }
                    weights[j] = updated;
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < CD_TOLERANCE {
                break;
            }
        }

        self.intercept = target_mean
            - column_means
                .iter()
                .zip(weights.iter())
                .map(|(&m, &w)| m * w)
                .sum::<f64>();
        self.coefficients = weights;
        Ok(())
    }
}

impl Predictor for LinearRegression {
    fn fit(&mut self, rows: &[Vec<f64>], targets: &[f64], params: &ParamSet) -> Result<()> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(EnsembleError::ModelError(
                "Empty training window".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(EnsembleError::ModelError(format!(
                "Training rows ({}) don't match targets ({})",
                rows.len(),
                targets.len()
            )));
        }

        match self.regularization {
            Regularization::None => self.fit_ols(rows, targets)?,
            Regularization::Lasso => {
                let alpha = params.get_float("alpha").unwrap_or(1.0);
                self.fit_coordinate_descent(rows, targets, alpha, 1.0)?;
            }
            Regularization::ElasticNet => {
                let alpha = params.get_float("alpha").unwrap_or(1.0);
                let l1_ratio = params.get_float("l1_ratio").unwrap_or(0.5);
                self.fit_coordinate_descent(rows, targets, alpha, l1_ratio)?;
            }
        }
        self.fitted = true;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.fitted {
            return Err(EnsembleError::ModelError(
                "Linear regression used before fit".to_string(),
            ));
        }
        if row.len() != self.coefficients.len() {
            return Err(EnsembleError::ModelError(format!(
                "Row of width {} doesn't match {} fitted coefficients",
                row.len(),
                self.coefficients.len()
            )));
        }
        Ok(self.intercept
            + row
                .iter()
                .zip(self.coefficients.iter())
                .map(|(&x, &w)| x * w)
                .sum::<f64>())
    }

    fn boxed_clone(&self) -> Box<dyn Predictor> {
        Box::new(self.clone())
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| {
                a[r1][col]
                    .abs()
                    .partial_cmp(&a[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            return Err(EnsembleError::ModelError(
                "Singular normal equations; features are collinear".to_string(),
            ));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    Ok(solution)
}

/// Plain ordinary least squares.
pub fn ordinary(run_config: &RunConfig) -> Result<ModelAdapter> {
    Ok(ModelAdapter::new(
        "linear_regression",
        Box::new(LinearRegression::new(Regularization::None)),
        HyperGrid::new(),
        run_config,
    ))
}

/// Lasso regression with a calibrated penalty.
pub fn lasso(run_config: &RunConfig) -> Result<ModelAdapter> {
    let grid = HyperGrid::new().with_values(
        "alpha",
        vec![
            ParamValue::Float(1e-4),
            ParamValue::Float(1e-3),
            ParamValue::Float(1e-2),
            ParamValue::Float(1e-1),
            ParamValue::Float(1.0),
            ParamValue::Float(10.0),
        ],
    );
    Ok(ModelAdapter::new(
        "lasso",
        Box::new(LinearRegression::new(Regularization::Lasso)),
        grid,
        run_config,
    ))
}

/// ElasticNet regression with calibrated penalty and mixing.
pub fn elastic_net(run_config: &RunConfig) -> Result<ModelAdapter> {
    let grid = HyperGrid::new()
        .with_span("alpha", 1e-3, 10.0, 20)
        .with_span("l1_ratio", 0.0, 1.0, 20);
    Ok(ModelAdapter::new(
        "elastic_net",
        Box::new(LinearRegression::new(Regularization::ElasticNet)),
        grid,
        run_config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_rows() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2*x0 - x1 + 3
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, (i % 5) as f64])
            .collect();
        let targets = rows.iter().map(|r| 2.0 * r[0] - r[1] + 3.0).collect();
        (rows, targets)
    }

    #[test]
    fn ols_recovers_a_linear_function() {
        let (rows, targets) = linear_rows();
        let mut model = LinearRegression::new(Regularization::None);
        model.fit(&rows, &targets, &ParamSet::default()).unwrap();
        let prediction = model.predict_row(&[7.0, 2.0]).unwrap();
        assert!((prediction - (2.0 * 7.0 - 2.0 + 3.0)).abs() < 1e-6);
    }

    #[test]
    fn lasso_with_tiny_penalty_tracks_ols() {
        let (rows, targets) = linear_rows();
        let mut params = ParamSet::default();
        params.insert("alpha", ParamValue::Float(1e-6));
        let mut model = LinearRegression::new(Regularization::Lasso);
        model.fit(&rows, &targets, &params).unwrap();
        let prediction = model.predict_row(&[7.0, 2.0]).unwrap();
        assert!((prediction - 15.0).abs() < 1e-2);
    }

    #[test]
    fn huge_penalty_shrinks_coefficients_to_zero() {
        let (rows, targets) = linear_rows();
        let mut params = ParamSet::default();
        params.insert("alpha", ParamValue::Float(1e6));
        let mut model = LinearRegression::new(Regularization::ElasticNet);
        model.fit(&rows, &targets, &params).unwrap();
        // all mass in the intercept: prediction collapses to the target mean
        let target_mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let prediction = model.predict_row(&[7.0, 2.0]).unwrap();
        assert!((prediction - target_mean).abs() < 1e-6);
    }

    #[test]
    fn collinear_features_fail_loudly() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut model = LinearRegression::new(Regularization::None);
        assert!(model.fit(&rows, &targets, &ParamSet::default()).is_err());
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let model = LinearRegression::new(Regularization::None);
        assert!(model.predict_row(&[1.0]).is_err());
    }
}
