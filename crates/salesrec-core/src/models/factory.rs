//! Construction and artifact loading for the estimator implementations.
use std::path::Path;

use anyhow::Result;

use crate::config::{EstimatorKind, EstimatorParams};
use crate::models::estimator::Estimator;
use crate::models::gbdt::GbdtRegressor;
use crate::models::linear::LinearRegressor;

/// Build a fresh, unfitted estimator from its hyper-parameters.
pub fn new_estimator(params: &EstimatorParams) -> Box<dyn Estimator> {
    match params {
        EstimatorParams::Linear { l2_penalty } => Box::new(LinearRegressor::new(*l2_penalty)),
        EstimatorParams::Gbdt {
            max_depth,
            num_boost_round,
            learning_rate,
            loss_type,
            training_optimization_level,
        } => Box::new(GbdtRegressor::new(
            *max_depth,
            *num_boost_round,
            *learning_rate,
            loss_type.clone(),
            *training_optimization_level,
        )),
    }
}

/// Reload a fitted estimator from its artifact file, dispatching on the
/// kind recorded in bundle metadata.
pub fn load_estimator(kind: EstimatorKind, path: &Path) -> Result<Box<dyn Estimator>> {
    match kind {
        EstimatorKind::Linear => Ok(Box::new(LinearRegressor::load(path)?)),
        EstimatorKind::Gbdt => Ok(Box::new(GbdtRegressor::load(path)?)),
    }
}
