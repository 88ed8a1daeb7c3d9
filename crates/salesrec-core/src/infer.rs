//! Inference over a loaded bundle: build candidate rows from the training
//! defaults plus caller overrides, fan out over the pivot column, and score
//! all candidates in one batch.
use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::features::clean_text;
use crate::math::Matrix;
use crate::store::ModelBundle;
use crate::trainer::FeatureDefault;

/// Score every pivot candidate under the given overrides and return a map
/// from candidate value to predicted target.
///
/// Overrides are raw strings as they arrive from a query: numeric columns
/// parse as floats, categorical values go through the same text cleanup the
/// training data received. Pinning the pivot column itself narrows the fan
/// out to that single candidate. Fields naming no known column are logged
/// and ignored.
pub fn predict(
    bundle: &ModelBundle,
    overrides: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, f64>> {
    let preprocessor = &bundle.preprocessor;
    let pivot = &bundle.metadata.pivot_column;

    let numeric_names: Vec<&str> = preprocessor.numeric_columns().collect();
    let categorical_names: Vec<&str> = preprocessor.categorical_columns().collect();

    // Base row in fit-time column order, seeded from the training defaults.
    let mut numeric: Vec<Option<f64>> = numeric_names
        .iter()
        .map(|name| match bundle.metadata.feature_defaults.get(*name) {
            Some(FeatureDefault::Numeric(v)) => Some(*v),
            _ => None,
        })
        .collect();
    let mut categorical: Vec<Option<String>> = categorical_names
        .iter()
        .map(|name| match bundle.metadata.feature_defaults.get(*name) {
            Some(FeatureDefault::Categorical(v)) => Some(v.clone()),
            _ => None,
        })
        .collect();

    let mut pinned_pivot: Option<String> = None;
    for (field, raw) in overrides {
        if let Some(slot) = numeric_names.iter().position(|n| n == field) {
            let value: f64 = raw
                .parse()
                .with_context(|| format!("field '{}' expects a number, got '{}'", field, raw))?;
            numeric[slot] = Some(value);
        } else if let Some(slot) = categorical_names.iter().position(|n| n == field) {
            let value = clean_text(raw);
            if field == pivot {
                pinned_pivot = Some(value);
            } else {
                categorical[slot] = Some(value);
            }
        } else {
            log::warn!("ignoring unknown prediction field '{}'", field);
        }
    }

    let pivot_slot = categorical_names
        .iter()
        .position(|n| n == pivot)
        .with_context(|| format!("pivot column '{}' is not a categorical feature", pivot))?;
    let candidates: Vec<String> = match pinned_pivot {
        Some(value) => vec![value],
        None => bundle
            .metadata
            .feature_categories
            .get(pivot)
            .cloned()
            .unwrap_or_default(),
    };
    if candidates.is_empty() {
        bail!("no candidate values available for pivot column '{}'", pivot);
    }

    let mut rows = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let mut row_categorical = categorical.clone();
        row_categorical[pivot_slot] = Some(candidate.clone());
        rows.push(preprocessor.transform_one(&numeric, &row_categorical));
    }
    let x = Matrix::from_rows(&rows)?;
    let predictions = bundle.model.predict(&x)?;

    Ok(candidates.into_iter().zip(predictions).collect())
}
