use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use salesrec_cli::prepare;
use salesrec_cli::serve::{self, ServeConfig};
use salesrec_cli::train::{self, TrainCommandConfig};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or(
            "SALESREC_LOG",
            "error,salesrec_core=info,salesrec_cli=info",
        ))
        .init();

    let matches = Command::new("salesrec")
        .version(clap::crate_version!())
        .about("Sales opportunity recommender - data preparation, training, and serving")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("prepare")
                .about("Merge the raw CRM exports into a flat feature table")
                .arg(
                    Arg::new("raw_dir")
                        .long("raw-dir")
                        .help("Directory holding the raw CRM CSV exports")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("out")
                        .help("Path for the generated feature table CSV")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("train")
                .about("Train a model from a feature table and publish it to the store")
                .arg(
                    Arg::new("features")
                        .help("Path to the feature table CSV produced by 'prepare'")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("models_root")
                        .short('m')
                        .long("models-root")
                        .help("Root directory of the model artifact store")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to a training configuration JSON file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("estimator")
                        .short('e')
                        .long("estimator")
                        .help("Estimator family. Overrides the configuration file.")
                        .value_parser(["linear", "gbdt"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("promote")
                        .long("promote")
                        .help("Promote the freshly trained version to production")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve trained models over HTTP")
                .arg(
                    Arg::new("models_root")
                        .short('m')
                        .long("models-root")
                        .help("Root directory of the model artifact store")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .help("Address to bind")
                        .default_value("127.0.0.1")
                        .value_hint(ValueHint::Hostname),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to listen on")
                        .default_value("8080")
                        .value_parser(clap::value_parser!(u16))
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("env")
                        .long("env")
                        .help(
                            "Deployment environment. Only 'dev' resolves the literal \
                             'latest' version segment. Defaults to $SALESREC_ENV, then 'dev'.",
                        )
                        .value_parser(["dev", "staging", "production"])
                        .value_hint(ValueHint::Other),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("prepare", sub_m)) => handle_prepare(sub_m),
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("serve", sub_m)) => handle_serve(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_prepare(matches: &ArgMatches) -> Result<()> {
    let raw_dir: &PathBuf = matches.get_one("raw_dir").unwrap();
    let output_file: &PathBuf = matches.get_one("output_file").unwrap();
    log::info!("[salesrec::prepare] Reading raw exports from {:?}", raw_dir);

    match prepare::run_prepare(raw_dir, output_file) {
        Ok(rows) => {
            println!("Wrote {} rows to {}", rows, output_file.display());
            Ok(())
        }
        Err(e) => {
            log::error!("Preparation failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = TrainCommandConfig::from_arguments(matches)?;
    log::info!(
        "[salesrec::train] Training from feature table: {:?}",
        config.features
    );

    match train::run_training(&config) {
        Ok(outcome) => {
            println!("Published model version {}", outcome.version);
            println!("Score: {:.4} (+/- {:.4})", outcome.mean, outcome.std * 2.0);
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let env = matches
        .get_one::<String>("env")
        .cloned()
        .or_else(|| std::env::var("SALESREC_ENV").ok())
        .unwrap_or_else(|| "dev".to_string());
    let config = ServeConfig {
        models_root: matches.get_one::<PathBuf>("models_root").unwrap().clone(),
        addr: format!(
            "{}:{}",
            matches.get_one::<String>("host").unwrap(),
            matches.get_one::<u16>("port").unwrap()
        ),
        dev_mode: env == "dev",
    };
    log::info!(
        "[salesrec::serve] Serving models from {:?} (env: {})",
        config.models_root,
        env
    );

    match serve::run(&config) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Server failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
