//! The flat feature/target table produced by the feature builder and
//! consumed by the trainer.
//!
//! Columns are either numeric or categorical and keep per-row missing
//! values as `None`. The target column is named explicitly in the schema
//! rather than implied by position, although the CSV writer still places it
//! last for compatibility with downstream tooling.
use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    fn select(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => {
                ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    columns: Vec<Column>,
    target: String,
}

impl FeatureTable {
    /// Build a table, validating that all columns have the same length and
    /// that the named target exists and is numeric.
    pub fn new(columns: Vec<Column>, target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        let n_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        for col in &columns {
            ensure!(
                col.data.len() == n_rows,
                "column '{}' has {} rows, expected {}",
                col.name,
                col.data.len(),
                n_rows
            );
        }
        let target_col = columns
            .iter()
            .find(|c| c.name == target)
            .with_context(|| format!("target column '{}' not present in table", target))?;
        ensure!(
            target_col.data.is_numeric(),
            "target column '{}' must be numeric",
            target
        );
        Ok(Self { columns, target })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Feature columns in table order, target excluded.
    pub fn feature_columns(&self) -> impl Iterator<Item = &Column> {
        let target = self.target.clone();
        self.columns.iter().filter(move |c| c.name != target)
    }

    pub fn target_values(&self) -> &[Option<f64>] {
        match &self
            .column(&self.target)
            .expect("target column validated at construction")
            .data
        {
            ColumnData::Numeric(v) => v,
            ColumnData::Categorical(_) => unreachable!("target validated as numeric"),
        }
    }

    pub fn select_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.select(indices),
                })
                .collect(),
            target: self.target.clone(),
        }
    }

    /// Drop rows whose target value is missing. Feature columns may keep
    /// their nulls; imputation handles those later.
    pub fn drop_missing_target(&self) -> FeatureTable {
        let keep: Vec<usize> = self
            .target_values()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect();
        self.select_rows(&keep)
    }

    /// Reproducible shuffled train/holdout split. The holdout takes
    /// `ceil(n * holdout_fraction)` rows; together the two parts always
    /// cover the source exactly.
    pub fn split(&self, holdout_fraction: f64, seed: u64) -> Result<(FeatureTable, FeatureTable)> {
        ensure!(
            holdout_fraction > 0.0 && holdout_fraction < 1.0,
            "holdout_fraction must be in (0, 1), got {}",
            holdout_fraction
        );
        let n = self.n_rows();
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_holdout = ((n as f64) * holdout_fraction).ceil() as usize;
        ensure!(
            n_holdout < n,
            "holdout of {} rows would leave no training data (n = {})",
            n_holdout,
            n
        );
        let (train_idx, holdout_idx) = indices.split_at(n - n_holdout);
        Ok((self.select_rows(train_idx), self.select_rows(holdout_idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_table() -> FeatureTable {
        FeatureTable::new(
            vec![
                Column {
                    name: "color".into(),
                    data: ColumnData::Categorical(vec![
                        Some("red".into()),
                        None,
                        Some("blue".into()),
                        Some("red".into()),
                    ]),
                },
                Column {
                    name: "price".into(),
                    data: ColumnData::Numeric(vec![Some(1.0), Some(2.0), None, Some(4.0)]),
                },
                Column {
                    name: "value".into(),
                    data: ColumnData::Numeric(vec![Some(10.0), None, Some(30.0), Some(40.0)]),
                },
            ],
            "value",
        )
        .unwrap()
    }

    #[test]
    fn target_must_be_numeric() {
        let cols = vec![Column {
            name: "label".into(),
            data: ColumnData::Categorical(vec![Some("a".into())]),
        }];
        assert!(FeatureTable::new(cols, "label").is_err());
    }

    #[test]
    fn drop_missing_target_removes_rows() {
        let t = toy_table().drop_missing_target();
        assert_eq!(t.n_rows(), 3);
        assert!(t.target_values().iter().all(Option::is_some));
    }

    #[test]
    fn split_is_reproducible_and_covers_source() {
        let t = toy_table();
        let (a1, b1) = t.split(0.5, 7).unwrap();
        let (a2, b2) = t.split(0.5, 7).unwrap();
        assert_eq!(a1.n_rows() + b1.n_rows(), t.n_rows());
        assert_eq!(a1.target_values(), a2.target_values());
        assert_eq!(b1.target_values(), b2.target_values());
    }
}
