use salesrec_core::config::{EstimatorKind, EstimatorParams};
use salesrec_core::table::{Column, ColumnData, FeatureTable};
use salesrec_core::trainer::{train, FeatureDefault, TrainConfig};

/// 100 rows where the target is a clean linear function of the features,
/// with a deliberate sprinkle of missing values.
fn synthetic_table() -> FeatureTable {
    let n = 100;
    let agents = ["alice", "bob", "carol", "dan"];
    let regions = ["east", "west"];

    let mut agent_col = Vec::with_capacity(n);
    let mut region_col = Vec::with_capacity(n);
    let mut size_col = Vec::with_capacity(n);
    let mut price_col = Vec::with_capacity(n);
    let mut target_col = Vec::with_capacity(n);

    for i in 0..n {
        let agent = agents[i % agents.len()];
        let region = regions[i % regions.len()];
        let size = (i % 17) as f64;
        let price = ((i * 7) % 23) as f64;

        let agent_effect = (i % agents.len()) as f64 * 50.0;
        let region_effect = if region == "east" { 100.0 } else { 0.0 };
        let target = 500.0 + 20.0 * size - 5.0 * price + agent_effect + region_effect;

        agent_col.push(Some(agent.to_string()));
        region_col.push(if i % 25 == 24 {
            None
        } else {
            Some(region.to_string())
        });
        size_col.push(if i % 30 == 29 { None } else { Some(size) });
        price_col.push(Some(price));
        target_col.push(if i % 20 == 19 { None } else { Some(target) });
    }

    FeatureTable::new(
        vec![
            Column {
                name: "sales_agent".into(),
                data: ColumnData::Categorical(agent_col),
            },
            Column {
                name: "region".into(),
                data: ColumnData::Categorical(region_col),
            },
            Column {
                name: "size".into(),
                data: ColumnData::Numeric(size_col),
            },
            Column {
                name: "price".into(),
                data: ColumnData::Numeric(price_col),
            },
            Column {
                name: "close_value".into(),
                data: ColumnData::Numeric(target_col),
            },
        ],
        "close_value",
    )
    .unwrap()
}

fn linear_config() -> TrainConfig {
    TrainConfig {
        estimator: EstimatorParams::Linear { l2_penalty: 1e-6 },
        ..TrainConfig::default()
    }
}

#[test]
fn trains_scores_and_builds_metadata() {
    let table = synthetic_table();
    let bundle = train(&table, &linear_config()).unwrap();
    let meta = &bundle.metadata;

    assert_eq!(meta.model_type, EstimatorKind::Linear);
    assert_eq!(meta.target_column, "close_value");
    assert_eq!(meta.pivot_column, "sales_agent");

    // The relationship is nearly noiseless, so the holdout score should be
    // close to a perfect fit.
    assert_eq!(meta.test_score.folds.len(), 5);
    assert!(meta.test_score.mean > 0.9, "mean = {}", meta.test_score.mean);
    assert!(meta.test_score.std.is_finite());

    // Output feature names follow the preprocessor layout.
    assert_eq!(
        meta.feature_names_out,
        bundle.preprocessor.feature_names_out()
    );
    assert!(meta.feature_names_out.contains(&"sales_agent=alice".to_string()));

    // Linear models publish ranked importances.
    let importances = meta.feature_importances.as_ref().unwrap();
    assert_eq!(importances.len(), meta.feature_names_out.len());
    let sum: f64 = importances.iter().map(|fi| fi.importance).sum();
    assert!((sum - 1.0).abs() < 1e-9);
    for pair in importances.windows(2) {
        assert!(pair[0].importance >= pair[1].importance);
    }
}

#[test]
fn defaults_and_categories_come_from_the_full_frame() {
    let table = synthetic_table();
    let bundle = train(&table, &linear_config()).unwrap();
    let meta = &bundle.metadata;

    // Categorical default is the mode, numeric default is the mean.
    match meta.feature_defaults.get("sales_agent").unwrap() {
        FeatureDefault::Categorical(v) => assert_eq!(v, "alice"),
        other => panic!("unexpected default {:?}", other),
    }
    match meta.feature_defaults.get("price").unwrap() {
        FeatureDefault::Numeric(v) => assert!(v.is_finite()),
        other => panic!("unexpected default {:?}", other),
    }

    let agents = meta.feature_categories.get("sales_agent").unwrap();
    assert_eq!(agents, &vec!["alice", "bob", "carol", "dan"]);
    assert!(!meta.feature_categories.contains_key("price"));
}

#[test]
fn rejects_a_mismatched_target_name() {
    let table = synthetic_table();
    let config = TrainConfig {
        target_column: "revenue".into(),
        ..linear_config()
    };
    assert!(train(&table, &config).is_err());
}

#[test]
fn gbdt_training_produces_no_importances() {
    let table = synthetic_table();
    let config = TrainConfig {
        cv_folds: 3,
        estimator: EstimatorParams::Gbdt {
            max_depth: 3,
            num_boost_round: 30,
            learning_rate: 0.3,
            loss_type: "SquaredError".into(),
            training_optimization_level: 2,
        },
        ..TrainConfig::default()
    };
    let bundle = train(&table, &config).unwrap();
    assert_eq!(bundle.metadata.model_type, EstimatorKind::Gbdt);
    assert!(bundle.metadata.feature_importances.is_none());
    assert!(bundle.metadata.test_score.mean.is_finite());
}
