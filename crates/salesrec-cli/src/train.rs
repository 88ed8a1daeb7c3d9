//! The `train` subcommand: read a feature table, run the training
//! pipeline, and publish the bundle to the artifact store.
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;

use salesrec_core::config::EstimatorParams;
use salesrec_core::io::read_feature_table;
use salesrec_core::store::ArtifactStore;
use salesrec_core::trainer::{train, TrainConfig};

#[derive(Debug, Clone)]
pub struct TrainCommandConfig {
    pub features: PathBuf,
    pub models_root: PathBuf,
    pub promote: bool,
    pub train: TrainConfig,
}

impl TrainCommandConfig {
    /// Assemble the effective configuration: file values first, then CLI
    /// overrides on top.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut train = if let Some(config_path) = matches.get_one::<PathBuf>("config") {
            let config_json = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            serde_json::from_str(&config_json)
                .with_context(|| format!("Invalid training config: {:?}", config_path))?
        } else {
            TrainConfig::default()
        };

        if let Some(estimator) = matches.get_one::<String>("estimator") {
            train.estimator = EstimatorParams::from_str(estimator).map_err(anyhow::Error::msg)?;
        }

        Ok(Self {
            features: matches.get_one::<PathBuf>("features").unwrap().clone(),
            models_root: matches.get_one::<PathBuf>("models_root").unwrap().clone(),
            promote: matches.get_flag("promote"),
            train,
        })
    }
}

pub struct TrainOutcome {
    pub version: String,
    pub mean: f64,
    pub std: f64,
}

pub fn run_training(config: &TrainCommandConfig) -> Result<TrainOutcome> {
    let table = read_feature_table(&config.features, &config.train.target_column)?;
    let bundle = train(&table, &config.train)?;

    let store = ArtifactStore::new(&config.models_root);
    let version = store.save(&bundle)?;
    if config.promote {
        store.promote(&version)?;
    }

    Ok(TrainOutcome {
        version,
        mean: bundle.metadata.test_score.mean,
        std: bundle.metadata.test_score.std,
    })
}
