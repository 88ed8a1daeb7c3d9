//! Ordinary least squares with a small ridge penalty, solved through the
//! normal equations. The penalty keeps the system well-conditioned when
//! one-hot blocks introduce collinear columns.
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::EstimatorKind;
use crate::math::Matrix;
use crate::models::estimator::Estimator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearParams {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearRegressor {
    l2_penalty: f64,
    params: Option<LinearParams>,
}

impl LinearRegressor {
    pub fn new(l2_penalty: f64) -> Self {
        Self {
            l2_penalty,
            params: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read linear model: {}", path.display()))?;
        let params: LinearParams = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse linear model: {}", path.display()))?;
        Ok(Self {
            l2_penalty: 0.0,
            params: Some(params),
        })
    }

    pub fn params(&self) -> Option<&LinearParams> {
        self.params.as_ref()
    }
}

impl Estimator for LinearRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        let n = x.nrows();
        let p = x.ncols();
        ensure!(n == y.len(), "feature matrix and target length differ");
        ensure!(n > 0 && p > 0, "cannot fit on an empty matrix");

        // Normal equations over [1 | X]; the intercept column carries no
        // ridge penalty.
        let dim = p + 1;
        let mut a = vec![vec![0.0f64; dim]; dim];
        let mut b = vec![0.0f64; dim];
        for row in 0..n {
            let features = x.row_slice(row);
            for i in 0..dim {
                let xi = if i == 0 { 1.0 } else { features[i - 1] };
                b[i] += xi * y[row];
                for j in i..dim {
                    let xj = if j == 0 { 1.0 } else { features[j - 1] };
                    a[i][j] += xi * xj;
                }
            }
        }
        for i in 0..dim {
            for j in 0..i {
                a[i][j] = a[j][i];
            }
        }
        for (i, row) in a.iter_mut().enumerate().skip(1) {
            row[i] += self.l2_penalty.max(0.0);
        }

        let solution = solve_linear_system(a, b)?;
        self.params = Some(LinearParams {
            intercept: solution[0],
            coefficients: solution[1..].to_vec(),
        });
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| anyhow!("linear model has not been fitted"))?;
        ensure!(
            x.ncols() == params.coefficients.len(),
            "input has {} features, model expects {}",
            x.ncols(),
            params.coefficients.len()
        );
        Ok((0..x.nrows())
            .map(|row| {
                params.intercept
                    + x.row_slice(row)
                        .iter()
                        .zip(&params.coefficients)
                        .map(|(v, c)| v * c)
                        .sum::<f64>()
            })
            .collect())
    }

    /// Normalised absolute coefficients. Inputs are standardised by the
    /// preprocessor, so coefficient magnitude is comparable across columns.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        let params = self.params.as_ref()?;
        let total: f64 = params.coefficients.iter().map(|c| c.abs()).sum();
        if total <= 0.0 {
            return Some(vec![0.0; params.coefficients.len()]);
        }
        Some(
            params
                .coefficients
                .iter()
                .map(|c| c.abs() / total)
                .collect(),
        )
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Linear
    }

    fn save(&self, path: &Path) -> Result<()> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| anyhow!("refusing to save an unfitted linear model"))?;
        let json = serde_json::to_vec_pretty(params)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write linear model: {}", path.display()))
    }
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let dim = b.len();
    for col in 0..dim {
        let pivot = (col..dim)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        ensure!(
            a[pivot][col].abs() > 1e-12,
            "singular system while fitting linear model"
        );
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..dim {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..dim {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; dim];
    for row in (0..dim).rev() {
        let mut sum = b[row];
        for col in row + 1..dim {
            sum -= a[row][col] * x[col];
        }
        x[row] = sum / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_linear_relationship() {
        // y = 3 + 2*x0 - x1, no noise
        let x = Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![2.0, 3.0],
        ])
        .unwrap();
        let y: Vec<f64> = (0..x.nrows())
            .map(|r| 3.0 + 2.0 * x[(r, 0)] - x[(r, 1)])
            .collect();

        let mut model = LinearRegressor::new(1e-9);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-6, "prediction {} vs target {}", p, t);
        }
    }

    #[test]
    fn importances_are_normalised() {
        let x = Matrix::from_rows(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 2.0],
            vec![3.0, 1.0],
        ])
        .unwrap();
        let y = vec![1.0, 3.0, 7.0, 9.0];
        let mut model = LinearRegressor::new(1e-9);
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn predict_before_fit_errors() {
        let model = LinearRegressor::new(0.0);
        let x = Matrix::from_rows(&[vec![1.0]]).unwrap();
        assert!(model.predict(&x).is_err());
    }
}
