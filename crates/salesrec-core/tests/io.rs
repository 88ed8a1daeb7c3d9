use std::fs;

use tempfile::tempdir;

use salesrec_core::features::build_feature_table;
use salesrec_core::io::{
    read_feature_table, read_raw_tables, write_feature_table, ACCOUNTS_CSV, PRODUCTS_CSV,
    SALES_PIPELINE_CSV, SALES_TEAMS_CSV,
};
use salesrec_core::table::ColumnData;

fn write_fixtures(dir: &std::path::Path) {
    fs::write(
        dir.join(SALES_PIPELINE_CSV),
        "opportunity_id,sales_agent,product,account,deal_stage,engage_date,close_date,close_value\n\
         OPP1,Anna Snelling,GTX Basic,Acme,Won,2024-01-10,2024-02-09,1054\n\
         OPP2,Anna Snelling,GTX Basic,,Engaging,2024-03-01,,\n\
         OPP3,Vicki Laflamme,MG Special,Acme,Won,not-a-date,2024-04-01,55\n",
    )
    .unwrap();
    fs::write(
        dir.join(ACCOUNTS_CSV),
        "account,sector,revenue,office_location\nAcme,Retail,1100.5,United States\n",
    )
    .unwrap();
    fs::write(
        dir.join(PRODUCTS_CSV),
        "product,series,sales_price\nGTX Basic,GTX,550\nMG Special,MG,55\n",
    )
    .unwrap();
    fs::write(
        dir.join(SALES_TEAMS_CSV),
        "sales_agent,manager,regional_office\n\
         Anna Snelling,Dustin Brinkmann,Central\n\
         Vicki Laflamme,Dustin Brinkmann,Central\n",
    )
    .unwrap();
}

#[test]
fn reads_the_raw_exports_with_lenient_parsing() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());

    let raw = read_raw_tables(dir.path()).unwrap();
    assert_eq!(raw.opportunities.len(), 3);
    assert_eq!(raw.accounts.len(), 1);
    assert_eq!(raw.products.len(), 2);
    assert_eq!(raw.teams.len(), 2);

    // Blanks and malformed dates flow through as missing values.
    assert_eq!(raw.opportunities[1].account, None);
    assert_eq!(raw.opportunities[1].close_value, None);
    assert_eq!(raw.opportunities[2].engage_date, None);
    assert!(raw.opportunities[2].close_date.is_some());
}

#[test]
fn missing_required_column_is_an_error() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    // Drop the revenue column from the accounts export.
    fs::write(
        dir.path().join(ACCOUNTS_CSV),
        "account,sector,office_location\nAcme,Retail,United States\n",
    )
    .unwrap();
    let err = read_raw_tables(dir.path()).unwrap_err();
    assert!(err.to_string().contains("revenue"), "{:#}", err);
}

#[test]
fn feature_table_round_trips_through_csv() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());

    let raw = read_raw_tables(dir.path()).unwrap();
    let table = build_feature_table(&raw).unwrap();

    let path = dir.path().join("features.csv");
    write_feature_table(&table, &path).unwrap();
    let restored = read_feature_table(&path, "close_value").unwrap();

    assert_eq!(restored.n_rows(), table.n_rows());
    assert_eq!(restored.target_name(), "close_value");
    assert_eq!(restored.target_values(), table.target_values());

    // Column kinds survive the trip.
    assert!(restored.column("revenue").unwrap().data.is_numeric());
    assert!(!restored.column("manager").unwrap().data.is_numeric());
    match &restored.column("manager").unwrap().data {
        ColumnData::Categorical(v) => {
            assert_eq!(v[0].as_deref(), Some("dustin brinkmann"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn index_artifact_columns_are_skipped_on_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.csv");
    fs::write(
        &path,
        "Unnamed: 0,sales_agent,close_value\n0,alice,100\n1,bob,\n",
    )
    .unwrap();

    let table = read_feature_table(&path, "close_value").unwrap();
    assert!(table.column("Unnamed: 0").is_none());
    assert_eq!(table.n_rows(), 2);
    assert_eq!(table.target_values(), &[Some(100.0), None]);
}
