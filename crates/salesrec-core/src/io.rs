//! CSV input and output: the four raw CRM exports and the flat feature
//! table that sits between preparation and training.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::features::{
    AccountRecord, OpportunityRecord, ProductRecord, RawTables, SalesTeamRecord,
};
use crate::table::{Column, ColumnData, FeatureTable};

pub const ACCOUNTS_CSV: &str = "accounts.csv";
pub const PRODUCTS_CSV: &str = "products.csv";
pub const SALES_TEAMS_CSV: &str = "sales_teams.csv";
pub const SALES_PIPELINE_CSV: &str = "sales_pipeline.csv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column lookup by header name. Headers the caller never asks for are
/// simply ignored, so extra export columns are harmless.
struct HeaderIndex {
    index: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn require(&self, name: &str, file: &Path) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .with_context(|| format!("{} is missing required column '{}'", file.display(), name))
    }

    fn text(&self, record: &StringRecord, col: usize) -> Option<String> {
        record
            .get(col)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn number(&self, record: &StringRecord, col: usize) -> Option<f64> {
        self.text(record, col).and_then(|v| v.parse().ok())
    }

    /// Dates that fail to parse become missing values rather than errors;
    /// the source exports are known to contain blanks and stray formats.
    fn date(&self, record: &StringRecord, col: usize) -> Option<NaiveDate> {
        self.text(record, col)
            .and_then(|v| NaiveDate::parse_from_str(&v, DATE_FORMAT).ok())
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Read the four raw CRM exports from one directory.
pub fn read_raw_tables(dir: &Path) -> Result<RawTables> {
    let raw = RawTables {
        opportunities: read_opportunities(&dir.join(SALES_PIPELINE_CSV))?,
        accounts: read_accounts(&dir.join(ACCOUNTS_CSV))?,
        products: read_products(&dir.join(PRODUCTS_CSV))?,
        teams: read_sales_teams(&dir.join(SALES_TEAMS_CSV))?,
    };
    log::info!(
        "read {} opportunities, {} accounts, {} products, {} sales agents from {}",
        raw.opportunities.len(),
        raw.accounts.len(),
        raw.products.len(),
        raw.teams.len(),
        dir.display()
    );
    Ok(raw)
}

fn read_opportunities(path: &Path) -> Result<Vec<OpportunityRecord>> {
    let mut reader = open_reader(path)?;
    let idx = HeaderIndex::new(reader.headers()?);
    let opportunity_id = idx.require("opportunity_id", path)?;
    let sales_agent = idx.require("sales_agent", path)?;
    let product = idx.require("product", path)?;
    let account = idx.require("account", path)?;
    let deal_stage = idx.require("deal_stage", path)?;
    let engage_date = idx.require("engage_date", path)?;
    let close_date = idx.require("close_date", path)?;
    let close_value = idx.require("close_value", path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        rows.push(OpportunityRecord {
            opportunity_id: idx.text(&record, opportunity_id).unwrap_or_default(),
            sales_agent: idx.text(&record, sales_agent),
            product: idx.text(&record, product),
            account: idx.text(&record, account),
            deal_stage: idx.text(&record, deal_stage),
            engage_date: idx.date(&record, engage_date),
            close_date: idx.date(&record, close_date),
            close_value: idx.number(&record, close_value),
        });
    }
    Ok(rows)
}

fn read_accounts(path: &Path) -> Result<Vec<AccountRecord>> {
    let mut reader = open_reader(path)?;
    let idx = HeaderIndex::new(reader.headers()?);
    let account = idx.require("account", path)?;
    let sector = idx.require("sector", path)?;
    let revenue = idx.require("revenue", path)?;
    let office_location = idx.require("office_location", path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        rows.push(AccountRecord {
            account: idx.text(&record, account).unwrap_or_default(),
            sector: idx.text(&record, sector),
            revenue: idx.number(&record, revenue),
            office_location: idx.text(&record, office_location),
        });
    }
    Ok(rows)
}

fn read_products(path: &Path) -> Result<Vec<ProductRecord>> {
    let mut reader = open_reader(path)?;
    let idx = HeaderIndex::new(reader.headers()?);
    let product = idx.require("product", path)?;
    let series = idx.require("series", path)?;
    let sales_price = idx.require("sales_price", path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        rows.push(ProductRecord {
            product: idx.text(&record, product).unwrap_or_default(),
            series: idx.text(&record, series),
            sales_price: idx.number(&record, sales_price),
        });
    }
    Ok(rows)
}

fn read_sales_teams(path: &Path) -> Result<Vec<SalesTeamRecord>> {
    let mut reader = open_reader(path)?;
    let idx = HeaderIndex::new(reader.headers()?);
    let sales_agent = idx.require("sales_agent", path)?;
    let manager = idx.require("manager", path)?;
    let regional_office = idx.require("regional_office", path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        rows.push(SalesTeamRecord {
            sales_agent: idx.text(&record, sales_agent).unwrap_or_default(),
            manager: idx.text(&record, manager),
            regional_office: idx.text(&record, regional_office),
        });
    }
    Ok(rows)
}

/// Read a previously written feature table. Column kinds are inferred: a
/// column is numeric when every non-empty cell parses as a float. Index
/// artifacts (empty headers, "Unnamed:" prefixes) are skipped.
pub fn read_feature_table(path: &Path, target: &str) -> Result<FeatureTable> {
    let mut reader = open_reader(path)?;
    let headers: Vec<(usize, String)> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (i, h.trim().to_string()))
        .filter(|(_, h)| !h.is_empty() && !h.starts_with("Unnamed:"))
        .collect();
    if headers.is_empty() {
        bail!("{} has no usable columns", path.display());
    }

    let mut raw_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        for (slot, (col, _)) in headers.iter().enumerate() {
            let value = record
                .get(*col)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            raw_columns[slot].push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw_columns)
        .map(|((_, name), values)| {
            let all_numeric = values
                .iter()
                .flatten()
                .all(|v| v.parse::<f64>().is_ok());
            let data = if all_numeric {
                ColumnData::Numeric(
                    values
                        .iter()
                        .map(|v| v.as_ref().and_then(|s| s.parse().ok()))
                        .collect(),
                )
            } else {
                ColumnData::Categorical(values)
            };
            Column { name, data }
        })
        .collect();

    FeatureTable::new(columns, target)
        .with_context(|| format!("invalid feature table in {}", path.display()))
}

/// Write the feature table with the target column last; missing values
/// serialise as empty cells.
pub fn write_feature_table(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut columns: Vec<&Column> = table.feature_columns().collect();
    let target = table
        .column(table.target_name())
        .expect("target column validated at construction");
    columns.push(target);

    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
    for row in 0..table.n_rows() {
        let record: Vec<String> = columns
            .iter()
            .map(|c| match &c.data {
                ColumnData::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
                ColumnData::Categorical(v) => v[row].clone().unwrap_or_default(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    log::info!(
        "wrote feature table with {} rows to {}",
        table.n_rows(),
        path.display()
    );
    Ok(())
}
