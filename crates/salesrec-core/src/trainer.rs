//! Training pipeline: split, fit preprocessor and estimator, cross-validate
//! on the holdout, and assemble bundle metadata.
use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{EstimatorKind, EstimatorParams};
use crate::models::{new_estimator, Estimator};
use crate::preprocessing::Preprocessor;
use crate::stats;
use crate::table::{ColumnData, FeatureTable};

pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Fraction of rows held out for scoring.
    pub holdout_fraction: f64,
    /// Seed for the reproducible shuffled split.
    pub split_seed: u64,
    /// Folds for cross-validated scoring on the holdout.
    pub cv_folds: usize,
    /// Name of the target column in the dataset.
    pub target_column: String,
    /// Categorical column the inference service fans out over.
    pub pivot_column: String,
    pub estimator: EstimatorParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.3,
            split_seed: 42,
            cv_folds: 5,
            target_column: crate::features::TARGET_COLUMN.to_string(),
            pivot_column: crate::features::PIVOT_COLUMN.to_string(),
            estimator: EstimatorParams::default(),
        }
    }
}

/// Cross-validated score distribution. Consumers display a confidence
/// band, so the per-fold scores travel with the summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScore {
    pub mean: f64,
    pub std: f64,
    pub folds: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Training-time default for one feature column: mode for categorical,
/// mean for numeric. Serialises untagged so API consumers see a plain
/// string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureDefault {
    Numeric(f64),
    Categorical(String),
}

/// Everything the serving side needs to know about a trained bundle
/// besides the model and preprocessor themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub schema_version: u32,
    pub model_type: EstimatorKind,
    pub created_at: String,
    pub target_column: String,
    pub pivot_column: String,
    pub test_score: TestScore,
    pub feature_importances: Option<Vec<FeatureImportance>>,
    pub feature_defaults: BTreeMap<String, FeatureDefault>,
    pub feature_categories: BTreeMap<String, Vec<String>>,
    pub feature_names_out: Vec<String>,
}

/// Output of a training run, ready for the artifact store.
pub struct TrainedBundle {
    pub estimator: Box<dyn Estimator>,
    pub preprocessor: Preprocessor,
    pub metadata: ModelMetadata,
}

/// Run the full training pipeline over a feature table.
pub fn train(table: &FeatureTable, config: &TrainConfig) -> Result<TrainedBundle> {
    ensure!(
        table.target_name() == config.target_column,
        "dataset target '{}' does not match configured target '{}'",
        table.target_name(),
        config.target_column
    );

    let table = table.drop_missing_target();
    let n = table.n_rows();
    log::info!("training on {} rows with non-missing target", n);

    let (train_table, holdout_table) = table.split(config.holdout_fraction, config.split_seed)?;
    // Hard invariant: the split must cover the source exactly.
    ensure!(
        train_table.n_rows() + holdout_table.n_rows() == n,
        "split lost rows: {} + {} != {}",
        train_table.n_rows(),
        holdout_table.n_rows(),
        n
    );
    log::info!(
        "split: {} train rows, {} holdout rows",
        train_table.n_rows(),
        holdout_table.n_rows()
    );

    let preprocessor = Preprocessor::fit(&train_table)?;
    let x_train = preprocessor.transform(&train_table)?;
    // Hard invariant: imputation must leave no missing values behind.
    ensure!(
        x_train.as_slice().iter().all(|v| !v.is_nan()),
        "transformed training matrix contains missing values"
    );
    let y_train = target_vec(&train_table);

    let mut estimator = new_estimator(&config.estimator);
    estimator.fit(&x_train, &y_train)?;

    let x_holdout = preprocessor.transform(&holdout_table)?;
    let y_holdout = target_vec(&holdout_table);
    let test_score = cross_validate(&config.estimator, &x_holdout, &y_holdout, config.cv_folds)
        .context("cross-validated scoring on the holdout failed")?;
    log::info!(
        "test score: {:.4} (+/- {:.4})",
        test_score.mean,
        test_score.std * 2.0
    );

    let feature_importances = rank_importances(&preprocessor, estimator.as_ref());
    let (feature_defaults, feature_categories) = summarize_features(&table);

    let metadata = ModelMetadata {
        schema_version: ARTIFACT_SCHEMA_VERSION,
        model_type: estimator.kind(),
        created_at: chrono::Utc::now().to_rfc3339(),
        target_column: table.target_name().to_string(),
        pivot_column: config.pivot_column.clone(),
        test_score,
        feature_importances,
        feature_defaults,
        feature_categories,
        feature_names_out: preprocessor.feature_names_out(),
    };

    Ok(TrainedBundle {
        estimator,
        preprocessor,
        metadata,
    })
}

fn target_vec(table: &FeatureTable) -> Vec<f64> {
    table
        .target_values()
        .iter()
        .map(|v| v.expect("missing targets dropped before training"))
        .collect()
}

/// K-fold scoring over the transformed holdout: each fold refits a fresh
/// estimator on the remaining holdout rows and scores R2 on the fold.
fn cross_validate(
    params: &EstimatorParams,
    x: &crate::math::Matrix,
    y: &[f64],
    k: usize,
) -> Result<TestScore> {
    ensure!(
        y.len() >= k,
        "holdout has {} rows, need at least {} for {}-fold scoring",
        y.len(),
        k,
        k
    );
    let mut folds = Vec::with_capacity(k);
    for (train_idx, test_idx) in stats::k_fold_indices(y.len(), k) {
        let x_fit = x.select_rows(&train_idx);
        let y_fit: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let x_eval = x.select_rows(&test_idx);
        let y_eval: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

        let mut model = new_estimator(params);
        model.fit(&x_fit, &y_fit)?;
        let pred = model.predict(&x_eval)?;
        folds.push(stats::r2_score(&y_eval, &pred));
    }
    Ok(TestScore {
        mean: stats::mean(&folds),
        std: stats::std_dev(&folds),
        folds,
    })
}

/// Pair estimator importances with readable output feature names, ranked
/// descending. Absent entirely when the estimator has no importances.
fn rank_importances(
    preprocessor: &Preprocessor,
    estimator: &dyn Estimator,
) -> Option<Vec<FeatureImportance>> {
    let importances = estimator.feature_importances()?;
    let names = preprocessor.feature_names_out();
    debug_assert_eq!(names.len(), importances.len());
    let mut ranked: Vec<FeatureImportance> = names
        .into_iter()
        .zip(importances)
        .map(|(feature, importance)| FeatureImportance {
            feature,
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Some(ranked)
}

/// Per-feature defaults (mode / mean over the full feature frame) and the
/// full category list per categorical column. Columns with no observed
/// values get no default; inference falls back to the zero encoding.
fn summarize_features(
    table: &FeatureTable,
) -> (
    BTreeMap<String, FeatureDefault>,
    BTreeMap<String, Vec<String>>,
) {
    let mut defaults = BTreeMap::new();
    let mut categories = BTreeMap::new();

    for col in table.feature_columns() {
        match &col.data {
            ColumnData::Numeric(values) => {
                let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
                if !present.is_empty() {
                    defaults.insert(
                        col.name.clone(),
                        FeatureDefault::Numeric(stats::mean(&present)),
                    );
                }
            }
            ColumnData::Categorical(values) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for value in values.iter().flatten() {
                    *counts.entry(value.as_str()).or_default() += 1;
                }
                // Mode; ties break to the lexicographically smallest value.
                if let Some((mode, _)) = counts
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                {
                    defaults.insert(
                        col.name.clone(),
                        FeatureDefault::Categorical((*mode).to_string()),
                    );
                }

                let mut unique: Vec<String> = counts.keys().map(|k| k.to_string()).collect();
                unique.sort();
                categories.insert(col.name.clone(), unique);
            }
        }
    }

    (defaults, categories)
}
