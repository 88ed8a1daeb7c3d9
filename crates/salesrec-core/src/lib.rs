//! salesrec-core: training and serving primitives for sales-opportunity
//! recommendations.
//!
//! This crate covers the model artifact lifecycle: building a flat
//! feature/target table from raw CRM exports, fitting a column preprocessor
//! and a regression estimator, persisting {model, preprocessor, metadata} as
//! an immutable versioned bundle, and reconstructing feature rows at
//! inference time to score every candidate sales agent for a deal.
//!
//! The design favors small, testable modules: the HTTP surface lives in the
//! CLI crate and only composes the pieces exported here.
pub mod config;
pub mod error;
pub mod features;
pub mod infer;
pub mod io;
pub mod math;
pub mod models;
pub mod preprocessing;
pub mod stats;
pub mod store;
pub mod table;
pub mod trainer;
