use crate::chat::{ConversationOrchestrator, ModelClient, OllamaClient};
use crate::config::{Config, CorpusLocation, EmbeddingBackend};
use crate::corpus::{CorpusSource, CsvCorpusSource, HttpCorpusSource};
use crate::error::Result;
use crate::index::CatalogIndex;
use crate::inference::{BiEncoderEmbedder, EmbeddingProvider, RemoteEmbedder};
use crate::retrieval::RetrievalEngine;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers.
///
/// Every collaborator is owned here and injected; nothing reaches for global
/// state.
pub struct AppState {
    pub retrieval: Arc<RetrievalEngine>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub corpus: Arc<dyn CorpusSource>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state from configuration.
    ///
    /// Loads the embedder, then serves the on-disk snapshot if it matches the
    /// current corpus or rebuilds the index otherwise. A failed initial build
    /// is logged and the service starts not-ready; `POST /rebuild_index` can
    /// recover it without a restart.
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = build_embedder(&config)?;
        let corpus = build_corpus_source(&config)?;
        let client: Arc<dyn ModelClient> = Arc::new(OllamaClient::new(
            config.model_url.clone(),
            config.model_name.clone(),
            Duration::from_secs(config.model_timeout_secs),
        )?);

        let state = Self::from_parts(config, embedder, corpus, client);

        match state.retrieval.load_or_rebuild(state.corpus.as_ref()).await {
            Ok(summary) => tracing::info!(
                records = summary.records,
                dimension = summary.dimension,
                elapsed_ms = summary.elapsed_ms,
                "Catalog index ready"
            ),
            Err(e) => tracing::error!(error = %e, "Initial index build failed; serving not-ready"),
        }

        Ok(state)
    }

    /// Assemble state from already-constructed collaborators.
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn CorpusSource>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        let retrieval = Arc::new(
            RetrievalEngine::new(embedder, Arc::new(CatalogIndex::new()))
                .with_margin(config.search_margin)
                .with_batch_size(config.embedding_batch_size)
                .with_snapshot_path(config.index_path.clone()),
        );

        let orchestrator = Arc::new(
            ConversationOrchestrator::new(client, Arc::clone(&retrieval))
                .with_max_tool_rounds(config.max_tool_rounds)
                .with_max_books(config.max_books_per_search)
                .with_system_prompt(config.system_prompt.clone()),
        );

        Self {
            retrieval,
            orchestrator,
            corpus,
            config: Arc::new(config),
        }
    }

    /// Check if the service has an index to search.
    pub async fn is_ready(&self) -> bool {
        self.retrieval.catalog().is_ready().await
    }
}

fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match &config.embedding {
        EmbeddingBackend::Onnx {
            model_path,
            tokenizer_path,
            max_sequence_length,
            pool_size,
        } => {
            let pool_size = pool_size.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            });
            tracing::info!(pool_size, "Loading local embedding model");

            Ok(Arc::new(BiEncoderEmbedder::load(
                model_path,
                tokenizer_path,
                *max_sequence_length,
                pool_size,
            )?))
        }
        EmbeddingBackend::Remote { url, model } => {
            tracing::info!(url = %url, model = %model, "Using remote embedding endpoint");
            Ok(Arc::new(RemoteEmbedder::new(url.clone(), model.clone())?))
        }
    }
}

fn build_corpus_source(config: &Config) -> Result<Arc<dyn CorpusSource>> {
    Ok(match &config.corpus {
        CorpusLocation::Csv(path) => Arc::new(CsvCorpusSource::new(path.clone())),
        CorpusLocation::Http(url) => Arc::new(HttpCorpusSource::new(url.clone())?),
    })
}
