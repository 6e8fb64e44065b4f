use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness plus what the served index looks like.
#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub embedder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

/// GET /health - Liveness probe
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready - 200 once a catalog index is being served, 503 before that.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let embedder = state.retrieval.embedder_id();

    match state.retrieval.catalog().current().await {
        Ok(catalog) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                embedder,
                records: Some(catalog.len()),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not_ready",
                embedder,
                records: None,
            }),
        ),
    }
}
