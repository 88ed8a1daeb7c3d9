pub mod estimator;
pub mod factory;
pub mod gbdt;
pub mod linear;

pub use estimator::Estimator;
pub use factory::{load_estimator, new_estimator};
