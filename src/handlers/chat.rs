use crate::chat::{ChatMessage, ChatOutcome};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Prior turns to continue from. The server keeps no sessions.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// POST /chat - Answer a user message, searching the catalog when the model asks.
///
/// # Flow
/// 1. Reject an empty message (400, model not called)
/// 2. Resolve the exchange: model call, optional `search_books` round, final reply
/// 3. Return the reply plus the full history for the next turn
///
/// The whole exchange is bounded by the configured model timeout.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>> {
    if request.message.trim().is_empty() {
        return Err(AppError::EmptyQuery);
    }

    let exchange_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %exchange_id);
    let start_time = std::time::Instant::now();
    let timeout = Duration::from_secs(state.config.model_timeout_secs);

    let outcome = tokio::time::timeout(
        timeout,
        state
            .orchestrator
            .chat(&request.message, request.history)
            .instrument(span.clone()),
    )
    .await
    .map_err(|_| {
        AppError::ModelUnavailable(format!(
            "Chat exchange timed out after {}s",
            timeout.as_secs()
        ))
    })??;

    span.in_scope(|| {
        tracing::info!(
            turns = outcome.history.len(),
            total_ms = start_time.elapsed().as_millis() as u64,
            "Chat exchange completed"
        )
    });

    metrics::counter!("chat_requests_total").increment(1);
    metrics::histogram!("chat_latency_ms").record(start_time.elapsed().as_millis() as f64);

    Ok(Json(outcome))
}
