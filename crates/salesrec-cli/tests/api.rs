use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use salesrec_cli::serve::{build_router, ServerState};
use salesrec_core::config::EstimatorParams;
use salesrec_core::store::ArtifactStore;
use salesrec_core::table::{Column, ColumnData, FeatureTable};
use salesrec_core::trainer::{train, TrainConfig};

fn seeded_store() -> (TempDir, String) {
    let n = 60;
    let agents = ["alice", "bob", "carol"];
    let mut agent = Vec::with_capacity(n);
    let mut deal_size = Vec::with_capacity(n);
    let mut close_value = Vec::with_capacity(n);
    for i in 0..n {
        let a = i % agents.len();
        agent.push(Some(agents[a].to_string()));
        deal_size.push(Some((i % 11) as f64));
        close_value.push(Some(100.0 * (a as f64 + 1.0) + 10.0 * (i % 11) as f64));
    }
    let table = FeatureTable::new(
        vec![
            Column {
                name: "sales_agent".into(),
                data: ColumnData::Categorical(agent),
            },
            Column {
                name: "deal_size".into(),
                data: ColumnData::Numeric(deal_size),
            },
            Column {
                name: "close_value".into(),
                data: ColumnData::Numeric(close_value),
            },
        ],
        "close_value",
    )
    .unwrap();

    let config = TrainConfig {
        estimator: EstimatorParams::Linear { l2_penalty: 1e-6 },
        ..TrainConfig::default()
    };
    let bundle = train(&table, &config).unwrap();

    let dir = TempDir::new().unwrap();
    let version = ArtifactStore::new(dir.path()).save(&bundle).unwrap();
    (dir, version)
}

fn router(dir: &TempDir, dev_mode: bool) -> axum::Router {
    build_router(Arc::new(ServerState::new(dir.path(), dev_mode)))
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn index_and_versions_respond() {
    let (dir, version) = seeded_store();

    let (status, body) = get_json(router(&dir, false), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["greeting"].as_str().unwrap().contains("salesrec"));
    assert!(body["timestamp"].is_string());

    let (status, body) = get_json(router(&dir, false), "/versions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["versions"], serde_json::json!([version]));
}

#[tokio::test]
async fn info_reports_score_and_feature_summaries() {
    let (dir, version) = seeded_store();

    let (status, body) = get_json(router(&dir, false), &format!("/{}/info", version)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], serde_json::json!(version));
    assert_eq!(body["model_type"], "linear");
    assert!(body["test_score"]["mean"].as_f64().unwrap().is_finite());
    assert!(body["test_score"]["summary"]
        .as_str()
        .unwrap()
        .contains("(+/-"));
    assert_eq!(
        body["features"]["categories"]["sales_agent"],
        serde_json::json!(["alice", "bob", "carol"])
    );
    assert!(body["features"]["defaults"]["deal_size"].is_number());
}

#[tokio::test]
async fn predict_fans_out_and_accepts_overrides() {
    let (dir, version) = seeded_store();

    let (status, body) = get_json(router(&dir, false), &format!("/{}/predict", version)).await;
    assert_eq!(status, StatusCode::OK);
    let all = body.as_object().unwrap();
    assert_eq!(all.len(), 3);
    assert!(all["alice"].as_f64().unwrap() < all["carol"].as_f64().unwrap());

    let (status, body) = get_json(
        router(&dir, false),
        &format!("/{}/predict?sales_agent=bob&deal_size=5", version),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pinned = body.as_object().unwrap();
    assert_eq!(pinned.len(), 1);
    assert!(pinned.contains_key("bob"));

    let (status, _) = get_json(
        router(&dir, false),
        &format!("/{}/predict?deal_size=not-a-number", version),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feature_importances_are_rank_indexed_maps() {
    let (dir, version) = seeded_store();

    let (status, body) = get_json(
        router(&dir, false),
        &format!("/{}/feature-importances", version),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let feature = body["feature"].as_object().unwrap();
    let importance = body["importance"].as_object().unwrap();
    assert_eq!(feature.len(), importance.len());
    assert!(feature.contains_key("0"));
    // Ranked descending.
    let first = importance["0"].as_f64().unwrap();
    let last = importance[&(importance.len() - 1).to_string()].as_f64().unwrap();
    assert!(first >= last);
}

#[tokio::test]
async fn unknown_version_is_404() {
    let (dir, _version) = seeded_store();
    let (status, body) = get_json(router(&dir, false), "/19990101_000000/info").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn latest_segment_is_dev_mode_only() {
    let (dir, version) = seeded_store();

    let (status, body) = get_json(router(&dir, true), "/latest/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], serde_json::json!(version));

    let (status, _) = get_json(router(&dir, false), "/latest/info").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
