//! Column preprocessor: mean imputation plus robust (median/IQR) scaling
//! for numeric columns, fixed-vocabulary one-hot encoding for categorical
//! columns.
//!
//! The fitted state is immutable and travels inside the artifact bundle:
//! the output column order (numeric block first, then categorical, each in
//! fit-time input order) is a positional contract with the trained model.
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::math::Matrix;
use crate::stats;
use crate::table::{ColumnData, FeatureTable};

/// Per-column state for one numeric feature. `mean` fills missing values,
/// `center`/`scale` are the training median and IQR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericTransform {
    pub column: String,
    pub mean: f64,
    pub center: f64,
    pub scale: f64,
}

/// Fixed category vocabulary for one categorical feature, sorted at fit
/// time. A value outside the vocabulary encodes to all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub column: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric: Vec<NumericTransform>,
    categorical: Vec<CategoryEncoder>,
}

impl Preprocessor {
    /// Fit imputation, scaling, and vocabularies on the training table's
    /// feature columns. The target column is never part of the transform.
    pub fn fit(table: &FeatureTable) -> Result<Self> {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for col in table.feature_columns() {
            match &col.data {
                ColumnData::Numeric(values) => {
                    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
                    let mean = stats::mean(&present);
                    let center = stats::median(&present);
                    let iqr = stats::quantile(&present, 0.75) - stats::quantile(&present, 0.25);
                    // Constant columns scale by 1.0 instead of collapsing.
                    let scale = if iqr > 0.0 { iqr } else { 1.0 };
                    numeric.push(NumericTransform {
                        column: col.name.clone(),
                        mean,
                        center,
                        scale,
                    });
                }
                ColumnData::Categorical(values) => {
                    let mut categories: Vec<String> =
                        values.iter().flatten().cloned().collect();
                    categories.sort();
                    categories.dedup();
                    categorical.push(CategoryEncoder {
                        column: col.name.clone(),
                        categories,
                    });
                }
            }
        }

        ensure!(
            !numeric.is_empty() || !categorical.is_empty(),
            "cannot fit a preprocessor on a table with no feature columns"
        );
        Ok(Self {
            numeric,
            categorical,
        })
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric.iter().map(|t| t.column.as_str())
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.categorical.iter().map(|e| e.column.as_str())
    }

    pub fn categories_for(&self, column: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|e| e.column == column)
            .map(|e| e.categories.as_slice())
    }

    pub fn n_features_out(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|e| e.categories.len())
                .sum::<usize>()
    }

    /// Human-readable names for the output columns, in output order.
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|t| t.column.clone()).collect();
        for encoder in &self.categorical {
            for category in &encoder.categories {
                names.push(format!("{}={}", encoder.column, category));
            }
        }
        names
    }

    /// Transform a whole table into the numeric design matrix. Every fitted
    /// column must be present in the table with the kind seen at fit time.
    pub fn transform(&self, table: &FeatureTable) -> Result<Matrix> {
        let n_rows = table.n_rows();

        let mut numeric_cols: Vec<&[Option<f64>]> = Vec::with_capacity(self.numeric.len());
        for t in &self.numeric {
            let col = table
                .column(&t.column)
                .with_context(|| format!("numeric column '{}' missing from input", t.column))?;
            match &col.data {
                ColumnData::Numeric(values) => numeric_cols.push(values),
                ColumnData::Categorical(_) => {
                    anyhow::bail!("column '{}' was numeric at fit time", t.column)
                }
            }
        }
        let mut categorical_cols: Vec<&[Option<String>]> =
            Vec::with_capacity(self.categorical.len());
        for e in &self.categorical {
            let col = table
                .column(&e.column)
                .with_context(|| format!("categorical column '{}' missing from input", e.column))?;
            match &col.data {
                ColumnData::Categorical(values) => categorical_cols.push(values),
                ColumnData::Numeric(_) => {
                    anyhow::bail!("column '{}' was categorical at fit time", e.column)
                }
            }
        }

        let mut data = Vec::with_capacity(n_rows * self.n_features_out());
        for row in 0..n_rows {
            let numeric: Vec<Option<f64>> = numeric_cols.iter().map(|c| c[row]).collect();
            let categorical: Vec<Option<String>> =
                categorical_cols.iter().map(|c| c[row].clone()).collect();
            data.extend(self.transform_one(&numeric, &categorical));
        }

        Matrix::from_shape_vec((n_rows, self.n_features_out()), data)
            .map_err(anyhow::Error::from)
    }

    /// Transform one row given per-column values in fit-time order:
    /// `numeric[i]` pairs with the i-th numeric transform, `categorical[j]`
    /// with the j-th encoder. Missing numerics impute to the training mean;
    /// missing or unknown categories encode to all zeros.
    pub fn transform_one(
        &self,
        numeric: &[Option<f64>],
        categorical: &[Option<String>],
    ) -> Vec<f64> {
        assert_eq!(numeric.len(), self.numeric.len(), "numeric arity mismatch");
        assert_eq!(
            categorical.len(),
            self.categorical.len(),
            "categorical arity mismatch"
        );

        let mut out = Vec::with_capacity(self.n_features_out());
        for (value, t) in numeric.iter().zip(&self.numeric) {
            let v = value.unwrap_or(t.mean);
            out.push((v - t.center) / t.scale);
        }
        for (value, encoder) in categorical.iter().zip(&self.categorical) {
            for category in &encoder.categories {
                let hit = value.as_deref() == Some(category.as_str());
                out.push(if hit { 1.0 } else { 0.0 });
            }
        }
        out
    }
}
