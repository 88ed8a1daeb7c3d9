use std::path::Path;

use anyhow::Result;

use crate::config::EstimatorKind;
use crate::math::Matrix;

/// Contract between the trainer and the estimator implementations. Rows of
/// `x` follow the preprocessor's output column order; coefficients and
/// splits are positionally bound to it.
pub trait Estimator: Send + Sync {
    /// Fit on the transformed training matrix and target values.
    fn fit(&mut self, x: &Matrix, y: &[f64]) -> Result<()>;

    /// Predict one value per row. Fails if the model was never fitted.
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>>;

    /// Per-output-feature importances, when the estimator exposes them.
    /// Implementations without the capability return `None`; the trainer
    /// records the absence instead of fabricating values.
    fn feature_importances(&self) -> Option<Vec<f64>>;

    fn kind(&self) -> EstimatorKind;

    /// Write the fitted parameters to the given artifact path.
    fn save(&self, path: &Path) -> Result<()>;
}
