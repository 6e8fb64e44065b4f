//! Shelfwise - book recommendation chat service
//!
//! This library exposes the retrieval engine, the conversation orchestrator and
//! the HTTP handlers, enabling integration tests and embedding in other
//! applications.

pub mod chat;
pub mod config;
pub mod corpus;
pub mod error;
pub mod handlers;
pub mod index;
pub mod inference;
pub mod persistence;
pub mod retrieval;
pub mod state;

// Re-export key types for convenience
pub use chat::{ChatMessage, ConversationOrchestrator, ModelClient, OllamaClient};
pub use config::Config;
pub use corpus::{CorpusEntry, CorpusSource, CsvCorpusSource};
pub use error::{AppError, Result};
pub use handlers::{chat_handler, health_handler, ready_handler, rebuild_handler, search_handler};
pub use index::{CatalogIndex, CatalogRecord, IndexedCatalog};
pub use inference::EmbeddingProvider;
pub use retrieval::RetrievalEngine;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Application routes without middleware or metrics.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/search", post(search_handler))
        .route("/rebuild_index", post(rebuild_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}
