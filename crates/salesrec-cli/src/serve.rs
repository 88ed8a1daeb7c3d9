//! The `serve` subcommand: versioned HTTP inference API over the artifact
//! store.
//!
//! Every endpoint names the model version in the path, so responses are
//! tied to an immutable bundle. Bundles are re-read from disk per request;
//! published versions never change, so there is no cache invalidation to
//! get wrong.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use salesrec_core::error::StoreError;
use salesrec_core::infer::predict;
use salesrec_core::store::{ArtifactStore, ModelBundle, VersionSpec};

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub models_root: PathBuf,
    pub addr: String,
    pub dev_mode: bool,
}

pub struct ServerState {
    store: ArtifactStore,
    dev_mode: bool,
}

impl ServerState {
    pub fn new(models_root: impl Into<PathBuf>, dev_mode: bool) -> Self {
        Self {
            store: ArtifactStore::new(models_root.into()),
            dev_mode,
        }
    }
}

type SharedState = Arc<ServerState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            StoreError::PartialArtifact { .. } | StoreError::Io { .. } => {
                log::error!("store failure: {}", err);
                ApiError::internal(err.to_string())
            }
        }
    }
}

pub fn run(config: &ServeConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: &ServeConfig) -> Result<()> {
    let state = Arc::new(ServerState::new(&config.models_root, config.dev_mode));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.addr))?;
    log::info!("listening on {}", config.addr);
    axum::serve(listener, app)
        .await
        .context("inference server terminated unexpectedly")
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/versions", get(handle_versions))
        .route("/:version/info", get(handle_info))
        .route("/:version/predict", get(handle_predict))
        .route("/:version/feature-importances", get(handle_importances))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a version path segment to a bundle. The literal segment "latest"
/// is a development convenience only; outside dev mode callers must pin
/// an explicit version so results stay reproducible.
fn load_bundle(state: &ServerState, segment: &str) -> Result<ModelBundle, ApiError> {
    let spec = if segment == "latest" {
        if !state.dev_mode {
            return Err(ApiError::bad_request(
                "'latest' is only available in dev mode; request an explicit version",
            ));
        }
        VersionSpec::Latest
    } else {
        VersionSpec::Named(segment.to_string())
    };
    Ok(state.store.load(&spec)?)
}

#[derive(Serialize)]
struct IndexResponse {
    greeting: &'static str,
    timestamp: String,
}

async fn handle_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        greeting: "salesrec inference API",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct VersionsResponse {
    versions: Vec<String>,
}

async fn handle_versions(
    State(state): State<SharedState>,
) -> Result<Json<VersionsResponse>, ApiError> {
    let versions = state.store.versions()?;
    Ok(Json(VersionsResponse { versions }))
}

#[derive(Serialize)]
struct ScoreResponse {
    mean: f64,
    std: f64,
    summary: String,
}

#[derive(Serialize)]
struct FeaturesResponse {
    out: Vec<String>,
    defaults: serde_json::Value,
    categories: serde_json::Value,
}

#[derive(Serialize)]
struct InfoResponse {
    version: String,
    model_type: String,
    created_at: String,
    test_score: ScoreResponse,
    features: FeaturesResponse,
}

async fn handle_info(
    State(state): State<SharedState>,
    Path(version): Path<String>,
) -> Result<Json<InfoResponse>, ApiError> {
    let bundle = load_bundle(&state, &version)?;
    let meta = &bundle.metadata;
    let score = &meta.test_score;
    Ok(Json(InfoResponse {
        version: bundle.version.clone(),
        model_type: meta.model_type.to_string(),
        created_at: meta.created_at.clone(),
        test_score: ScoreResponse {
            mean: score.mean,
            std: score.std,
            summary: format!("{:.4} (+/- {:.4})", score.mean, score.std * 2.0),
        },
        features: FeaturesResponse {
            out: meta.feature_names_out.clone(),
            defaults: serde_json::to_value(&meta.feature_defaults)
                .map_err(|e| ApiError::internal(e.to_string()))?,
            categories: serde_json::to_value(&meta.feature_categories)
                .map_err(|e| ApiError::internal(e.to_string()))?,
        },
    }))
}

async fn handle_predict(
    State(state): State<SharedState>,
    Path(version): Path<String>,
    Query(overrides): Query<BTreeMap<String, String>>,
) -> Result<Json<BTreeMap<String, f64>>, ApiError> {
    let bundle = load_bundle(&state, &version)?;
    let predictions =
        predict(&bundle, &overrides).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    Ok(Json(predictions))
}

/// Rank-indexed parallel maps, matching the frame layout downstream
/// dashboards already consume. Estimators without importances report
/// `null` rather than an empty frame.
async fn handle_importances(
    State(state): State<SharedState>,
    Path(version): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let bundle = load_bundle(&state, &version)?;
    let Some(ranked) = &bundle.metadata.feature_importances else {
        return Ok(Json(serde_json::Value::Null));
    };

    let mut feature = serde_json::Map::new();
    let mut importance = serde_json::Map::new();
    for (rank, fi) in ranked.iter().enumerate() {
        feature.insert(rank.to_string(), serde_json::json!(fi.feature));
        importance.insert(rank.to_string(), serde_json::json!(fi.importance));
    }
    Ok(Json(serde_json::json!({
        "feature": feature,
        "importance": importance,
    })))
}
