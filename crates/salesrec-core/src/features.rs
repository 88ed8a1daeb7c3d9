//! Feature table builder: merges the raw CRM tables into one row per
//! opportunity and derives the status, won, and duration columns.
use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use deunicode::deunicode;

use crate::table::{Column, ColumnData, FeatureTable};

pub const TARGET_COLUMN: &str = "close_value";
pub const PIVOT_COLUMN: &str = "sales_agent";

/// One sales-pipeline row before merging. Dates stay optional; a malformed
/// date parses to `None` and flows through as a missing value.
#[derive(Debug, Clone, Default)]
pub struct OpportunityRecord {
    pub opportunity_id: String,
    pub sales_agent: Option<String>,
    pub product: Option<String>,
    pub account: Option<String>,
    pub deal_stage: Option<String>,
    pub engage_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub close_value: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountRecord {
    pub account: String,
    pub sector: Option<String>,
    pub revenue: Option<f64>,
    pub office_location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductRecord {
    pub product: String,
    pub series: Option<String>,
    pub sales_price: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SalesTeamRecord {
    pub sales_agent: String,
    pub manager: Option<String>,
    pub regional_office: Option<String>,
}

/// The four raw CRM tables; the pipeline table drives the left joins.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub opportunities: Vec<OpportunityRecord>,
    pub accounts: Vec<AccountRecord>,
    pub products: Vec<ProductRecord>,
    pub teams: Vec<SalesTeamRecord>,
}

/// Trim, lowercase, and fold accents so category values compare
/// consistently between training data and user-supplied overrides.
pub fn clean_text(value: &str) -> String {
    deunicode(value.trim()).to_lowercase()
}

/// Opportunity status from date presence: no engage date means the deal
/// never started; an engage date without a close date is still open.
pub fn opportunity_status(
    engage_date: Option<NaiveDate>,
    close_date: Option<NaiveDate>,
) -> &'static str {
    match (engage_date, close_date) {
        (None, _) => "initial",
        (Some(_), None) => "in_progress",
        (Some(_), Some(_)) => "completed",
    }
}

/// Days between engage and close. May be negative for malformed source
/// data; passed through unclamped.
pub fn opportunity_duration(
    engage_date: Option<NaiveDate>,
    close_date: Option<NaiveDate>,
) -> Option<f64> {
    match (engage_date, close_date) {
        (Some(engage), Some(close)) => Some((close - engage).num_days() as f64),
        _ => None,
    }
}

/// Left-join the pipeline table against teams, accounts, and products and
/// derive the engineered columns. Joins use the raw key values; an
/// unmatched key silently yields nulls in the merged columns (known gap in
/// the source data contract, deliberately not rejected here). Text cleanup
/// happens after the joins so it cannot change match behavior.
pub fn build_feature_table(raw: &RawTables) -> Result<FeatureTable> {
    let teams: HashMap<&str, &SalesTeamRecord> = raw
        .teams
        .iter()
        .map(|t| (t.sales_agent.as_str(), t))
        .collect();
    let accounts: HashMap<&str, &AccountRecord> = raw
        .accounts
        .iter()
        .map(|a| (a.account.as_str(), a))
        .collect();
    let products: HashMap<&str, &ProductRecord> = raw
        .products
        .iter()
        .map(|p| (p.product.as_str(), p))
        .collect();

    let n = raw.opportunities.len();
    let mut sales_agent = Vec::with_capacity(n);
    let mut account = Vec::with_capacity(n);
    let mut status = Vec::with_capacity(n);
    let mut manager = Vec::with_capacity(n);
    let mut regional_office = Vec::with_capacity(n);
    let mut sector = Vec::with_capacity(n);
    let mut revenue = Vec::with_capacity(n);
    let mut office_location = Vec::with_capacity(n);
    let mut product = Vec::with_capacity(n);
    let mut series = Vec::with_capacity(n);
    let mut sales_price = Vec::with_capacity(n);
    let mut duration = Vec::with_capacity(n);
    let mut won = Vec::with_capacity(n);
    let mut close_value = Vec::with_capacity(n);

    for opp in &raw.opportunities {
        let team = opp
            .sales_agent
            .as_deref()
            .and_then(|key| teams.get(key).copied());
        let acct = opp
            .account
            .as_deref()
            .and_then(|key| accounts.get(key).copied());
        let prod = opp
            .product
            .as_deref()
            .and_then(|key| products.get(key).copied());

        let status_label = opportunity_status(opp.engage_date, opp.close_date);

        sales_agent.push(opp.sales_agent.as_deref().map(clean_text));
        account.push(opp.account.as_deref().map(clean_text));
        status.push(Some(status_label.to_string()));
        manager.push(team.and_then(|t| t.manager.as_deref()).map(clean_text));
        regional_office.push(
            team.and_then(|t| t.regional_office.as_deref())
                .map(clean_text),
        );
        sector.push(acct.and_then(|a| a.sector.as_deref()).map(clean_text));
        revenue.push(acct.and_then(|a| a.revenue));
        office_location.push(
            acct.and_then(|a| a.office_location.as_deref())
                .map(clean_text),
        );
        product.push(opp.product.as_deref().map(clean_text));
        series.push(prod.and_then(|p| p.series.as_deref()).map(clean_text));
        sales_price.push(prod.and_then(|p| p.sales_price));
        duration.push(opportunity_duration(opp.engage_date, opp.close_date));
        won.push(Some(if status_label == "completed" { 1.0 } else { 0.0 }));
        close_value.push(opp.close_value);
    }

    let columns = vec![
        cat("sales_agent", sales_agent),
        cat("account", account),
        cat("opportunity_status", status),
        cat("manager", manager),
        cat("regional_office", regional_office),
        cat("sector", sector),
        num("revenue", revenue),
        cat("office_location", office_location),
        cat("product", product),
        cat("series", series),
        num("sales_price", sales_price),
        num("duration", duration),
        num("won", won),
        num(TARGET_COLUMN, close_value),
    ];

    FeatureTable::new(columns, TARGET_COLUMN)
}

fn cat(name: &str, values: Vec<Option<String>>) -> Column {
    Column {
        name: name.to_string(),
        data: ColumnData::Categorical(values),
    }
}

fn num(name: &str, values: Vec<Option<f64>>) -> Column {
    Column {
        name: name.to_string(),
        data: ColumnData::Numeric(values),
    }
}
