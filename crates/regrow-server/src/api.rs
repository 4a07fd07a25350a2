//! HTTP API for progress records.

use crate::error::Error;
use crate::node::ServerState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use regrow_progress::{PartialProgress, ProgressState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<RwLock<ServerState>>;

/// Body of every progress response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressResponse {
    fn found(progress: ProgressState) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                ok: true,
                progress: Some(progress),
                error: None,
            }),
        )
    }

    fn failed(error: Error) -> (StatusCode, Json<Self>) {
        let status = error.status();
        if status.is_server_error() {
            tracing::warn!(error = %error, "Progress request failed");
        }
        (
            status,
            Json(Self {
                ok: false,
                progress: None,
                error: Some(error.to_string()),
            }),
        )
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // Browser clients call from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/progress/:user_key",
            get(get_progress).patch(patch_progress).delete(delete_progress),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn get_progress(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> (StatusCode, Json<ProgressResponse>) {
    let state = state.read().await;
    match state.storage.get_progress(&user_key) {
        Ok(Some(record)) => {
            ProgressResponse::found(record.resolve(&ProgressState::new_account()))
        }
        Ok(None) => ProgressResponse::failed(Error::NotFound(user_key)),
        Err(e) => ProgressResponse::failed(e),
    }
}

async fn patch_progress(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
    Json(patch): Json<PartialProgress>,
) -> (StatusCode, Json<ProgressResponse>) {
    // Write lock serializes read-merge-write per server
    let state = state.write().await;
    match state.storage.merge_progress(&user_key, patch) {
        Ok(merged) => ProgressResponse::found(merged),
        Err(e) => ProgressResponse::failed(e),
    }
}

async fn delete_progress(
    State(state): State<AppState>,
    Path(user_key): Path<String>,
) -> StatusCode {
    let state = state.write().await;
    match state.storage.delete_progress(&user_key) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => e.status(),
    }
}
