use crate::error::Result;
use crate::retrieval::RebuildSummary;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub summary: RebuildSummary,
}

/// POST /rebuild_index - Re-read the corpus, re-embed it, and swap the index.
///
/// Requests arriving during a rebuild wait for it and then run their own.
/// On failure the previous index keeps serving.
pub async fn rebuild_handler(State(state): State<Arc<AppState>>) -> Result<Json<RebuildResponse>> {
    match state.retrieval.rebuild(state.corpus.as_ref()).await {
        Ok(summary) => {
            metrics::counter!("index_rebuilds_total").increment(1);
            Ok(Json(RebuildResponse {
                status: "index rebuilt",
                summary,
            }))
        }
        Err(e) => {
            metrics::counter!("index_rebuild_failures_total").increment(1);
            Err(e)
        }
    }
}
