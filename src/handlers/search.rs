//! Direct catalog search, without the language model.

use crate::error::{AppError, Result};
use crate::index::CatalogRecord;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of results to return
fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text description of the books wanted
    #[serde(default)]
    pub query: String,
    /// Number of distinct books to return (default: 5)
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<CatalogRecord>,
}

/// POST /search - Find catalog books similar to a query.
///
/// Returns at most `k` distinct books, and at least two when the catalog has
/// them. `k` is clamped to the configured per-search maximum.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start_time = std::time::Instant::now();

    if request.query.trim().is_empty() {
        return Err(AppError::EmptyQuery);
    }
    if request.k == 0 {
        return Err(AppError::ValidationError("k must be at least 1".to_string()));
    }

    let k = request.k.min(state.config.max_books_per_search);
    let results = state.retrieval.search(&request.query, k).await?;

    let total_time = start_time.elapsed();
    tracing::info!(
        query = %request.query,
        k,
        returned = results.len(),
        total_ms = total_time.as_millis() as u64,
        "Search completed"
    );

    metrics::counter!("search_requests_total").increment(1);
    metrics::histogram!("search_latency_ms").record(total_time.as_millis() as f64);

    Ok(Json(SearchResponse { results }))
}
