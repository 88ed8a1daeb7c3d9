//! Gradient boosted decision tree regressor backed by the gbdt crate.
use std::path::Path;

use anyhow::{anyhow, ensure, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;

use crate::config::EstimatorKind;
use crate::math::Matrix;
use crate::models::estimator::Estimator;

pub struct GbdtRegressor {
    model: Option<GBDT>,
    max_depth: u32,
    num_boost_round: u32,
    learning_rate: f32,
    loss_type: String,
    training_optimization_level: u8,
}

impl GbdtRegressor {
    pub fn new(
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        loss_type: impl Into<String>,
        training_optimization_level: u8,
    ) -> Self {
        Self {
            model: None,
            max_depth,
            num_boost_round,
            learning_rate,
            loss_type: loss_type.into(),
            training_optimization_level,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("non-utf8 model path: {}", path.display()))?;
        let model = GBDT::load_model(path_str)
            .map_err(|e| anyhow!("failed to load gbdt model {}: {}", path.display(), e))?;
        Ok(Self {
            model: Some(model),
            max_depth: 0,
            num_boost_round: 0,
            learning_rate: 0.0,
            loss_type: String::new(),
            training_optimization_level: 0,
        })
    }

    fn to_data_vec(x: &Matrix) -> DataVec {
        let mut rows = DataVec::with_capacity(x.nrows());
        for row in 0..x.nrows() {
            let features: Vec<ValueType> =
                x.row_slice(row).iter().map(|v| *v as ValueType).collect();
            rows.push(Data::new_training_data(features, 1.0, 0.0, None));
        }
        rows
    }
}

impl Estimator for GbdtRegressor {
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()> {
        ensure!(x.nrows() == y.len(), "feature matrix and target length differ");
        ensure!(x.nrows() > 0, "cannot fit on an empty matrix");

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.learning_rate);
        config.set_max_depth(self.max_depth);
        config.set_iterations(self.num_boost_round as usize);
        config.set_debug(false);
        config.set_training_optimization_level(self.training_optimization_level);
        config.set_loss(&self.loss_type);

        let mut gbdt = GBDT::new(&config);
        let mut train_data = DataVec::with_capacity(x.nrows());
        for row in 0..x.nrows() {
            let features: Vec<ValueType> =
                x.row_slice(row).iter().map(|v| *v as ValueType).collect();
            train_data.push(Data::new_training_data(features, 1.0, y[row] as ValueType, None));
        }
        gbdt.fit(&mut train_data);
        self.model = Some(gbdt);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("gbdt model has not been fitted"))?;
        let test_data = Self::to_data_vec(x);
        let predictions = model.predict(&test_data);
        Ok(predictions.into_iter().map(|p| p as f64).collect())
    }

    /// The gbdt crate does not expose per-feature gain, so this estimator
    /// reports no importances rather than fabricating them.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Gbdt
    }

    fn save(&self, path: &Path) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("refusing to save an unfitted gbdt model"))?;
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("non-utf8 model path: {}", path.display()))?;
        model
            .save_model(path_str)
            .map_err(|e| anyhow!("failed to save gbdt model {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_and_predicts_finite_values() {
        // Target tracks the first feature; ten samples are enough for a
        // shallow tree to pick up the split.
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, (i % 3) as f64])
            .collect();
        let x = Matrix::from_rows(&rows).unwrap();
        let y: Vec<f64> = (0..20).map(|i| (i as f64) * 10.0).collect();

        let mut model = GbdtRegressor::new(3, 20, 0.3, "SquaredError", 2);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.len(), 20);
        assert!(pred.iter().all(|p| p.is_finite()));
        assert!(model.feature_importances().is_none());
    }
}
