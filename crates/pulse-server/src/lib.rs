//! HTTP surface for the content pipeline

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use shared::{BriefCatalog, CatalogResponse, ContentPipeline, ErrorBody, PartialBrief};

/// Shared across handlers; every run borrows the same pipeline
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ContentPipeline>,
    pub catalog: Arc<BriefCatalog>,
}

impl AppState {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            catalog: Arc::new(BriefCatalog::default()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/catalog", get(catalog))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/generate
///
/// Accepts any body. Anything that is not a JSON object runs on defaults.
/// If the client disconnects, axum drops this future and the run with it.
async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let value = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let partial = PartialBrief::from_value(value);

    match state.pipeline.generate(partial).await {
        Ok(output) => {
            info!("Generated content for {:?}", output.result.metadata.topic);
            (StatusCode::OK, Json(output)).into_response()
        }
        Err(failure) => {
            let body = ErrorBody {
                error: failure.public_message().to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// GET /api/catalog
async fn catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        catalog: state.catalog.as_ref().clone(),
        defaults: state.pipeline.defaults().clone(),
    })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
