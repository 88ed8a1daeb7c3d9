use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported estimator families and their hyper-parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorParams {
    /// Ridge-damped ordinary least squares.
    Linear { l2_penalty: f64 },
    /// Gradient boosted decision trees (gbdt crate), SquaredError loss for
    /// value regression.
    Gbdt {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        loss_type: String,
        training_optimization_level: u8,
    },
}

impl EstimatorParams {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            EstimatorParams::Linear { .. } => EstimatorKind::Linear,
            EstimatorParams::Gbdt { .. } => EstimatorKind::Gbdt,
        }
    }
}

impl Default for EstimatorParams {
    fn default() -> Self {
        EstimatorParams::Gbdt {
            max_depth: 4,
            num_boost_round: 100,
            learning_rate: 0.1,
            loss_type: "SquaredError".to_string(),
            training_optimization_level: 2,
        }
    }
}

impl FromStr for EstimatorParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(EstimatorParams::Linear { l2_penalty: 1e-6 }),
            "gbdt" => Ok(EstimatorParams::default()),
            _ => Err(format!(
                "Unknown estimator type: {}. Expected 'linear' or 'gbdt'",
                s
            )),
        }
    }
}

/// Persisted tag identifying which estimator wrote the model artifact; the
/// loader dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Linear,
    Gbdt,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorKind::Linear => write!(f, "linear"),
            EstimatorKind::Gbdt => write!(f, "gbdt"),
        }
    }
}
