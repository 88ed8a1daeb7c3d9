//! The `prepare` subcommand: raw CRM exports in, flat feature table out.
use std::path::Path;

use anyhow::Result;

use salesrec_core::features::build_feature_table;
use salesrec_core::io::{read_raw_tables, write_feature_table};

/// Merge the raw exports under `data_dir` and write the feature table to
/// `output_file`. Returns the number of rows written.
pub fn run_prepare(data_dir: &Path, output_file: &Path) -> Result<usize> {
    let raw = read_raw_tables(data_dir)?;
    let table = build_feature_table(&raw)?;
    write_feature_table(&table, output_file)?;
    Ok(table.n_rows())
}
