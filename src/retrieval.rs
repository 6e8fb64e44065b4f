//! Book retrieval over the catalog index.
//!
//! Search embeds the query, over-fetches neighbors, and walks them in distance
//! order collapsing duplicate catalog rows. Rebuild embeds a fresh corpus and
//! swaps it in only once it is complete.

use crate::corpus::{CorpusEntry, CorpusSource};
use crate::error::{AppError, Result};
use crate::index::{CatalogIndex, CatalogRecord, IndexedCatalog};
use crate::inference::EmbeddingProvider;
use crate::persistence;
use ndarray::{concatenate, Array2, Axis};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Extra neighbors fetched beyond the requested count.
pub const DEFAULT_SEARCH_MARGIN: usize = 20;

/// Searches never return fewer distinct records than this while the catalog has them.
const MIN_DISTINCT_RESULTS: usize = 2;

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub records: usize,
    pub dimension: usize,
    pub elapsed_ms: u64,
}

pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    catalog: Arc<CatalogIndex>,
    margin: usize,
    batch_size: usize,
    snapshot_path: Option<PathBuf>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, catalog: Arc<CatalogIndex>) -> Self {
        Self {
            embedder,
            catalog,
            margin: DEFAULT_SEARCH_MARGIN,
            batch_size: 64,
            snapshot_path: None,
        }
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Persist a snapshot to `path` after every successful rebuild.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn catalog(&self) -> &Arc<CatalogIndex> {
        &self.catalog
    }

    pub fn embedder_id(&self) -> String {
        self.embedder.id()
    }

    /// Find up to `desired_count` distinct records closest to `query`.
    ///
    /// # Flow
    /// 1. Reject empty queries
    /// 2. Embed the query
    /// 3. Fetch `margin + desired_count` nearest neighbors
    /// 4. Walk them in distance order, skipping records already collected
    /// 5. Stop once at least `max(2, desired_count)` distinct records are held
    ///
    /// When the margin runs out first, whatever was collected is returned.
    pub async fn search(&self, query: &str, desired_count: usize) -> Result<Vec<CatalogRecord>> {
        if query.trim().is_empty() {
            return Err(AppError::EmptyQuery);
        }

        let catalog = self.catalog.current().await?;

        let query_vec = self.embedder.embed(&[query.to_string()]).await?;
        if query_vec.nrows() != 1 {
            return Err(AppError::EmbeddingError(format!(
                "Expected one query embedding, got {}",
                query_vec.nrows()
            )));
        }

        let fetch = self.margin.saturating_add(desired_count);
        let neighbors = catalog.nearest(query_vec.row(0), fetch)?;
        let candidates = neighbors.len();
        let results = collect_distinct(
            neighbors.into_iter().map(|(record, _)| record),
            desired_count,
        );

        tracing::debug!(
            desired_count,
            candidates,
            returned = results.len(),
            "Catalog search completed"
        );

        Ok(results)
    }

    /// Rebuild the index from `source` and swap it in.
    ///
    /// Concurrent calls run one after another. On any failure the catalog
    /// being served stays as it was.
    pub async fn rebuild(&self, source: &dyn CorpusSource) -> Result<RebuildSummary> {
        let _guard = self.catalog.lock_rebuild().await;
        let start = Instant::now();

        tracing::info!(source = %source.describe(), "Rebuilding catalog index");

        let entries = source.fetch().await?;
        let built = self.build_catalog(entries).await?;
        let summary = RebuildSummary {
            records: built.len(),
            dimension: built.dimension(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = persistence::save_snapshot(path, &self.embedder.id(), &built) {
                tracing::warn!(error = %e, "Failed to persist index snapshot");
            }
        }

        self.catalog.swap(built).await;

        tracing::info!(
            records = summary.records,
            dimension = summary.dimension,
            elapsed_ms = summary.elapsed_ms,
            "Catalog index rebuilt"
        );

        Ok(summary)
    }

    /// Startup path: serve a matching snapshot if there is one, otherwise rebuild.
    pub async fn load_or_rebuild(&self, source: &dyn CorpusSource) -> Result<RebuildSummary> {
        if let Some(path) = &self.snapshot_path {
            let start = Instant::now();
            let entries = source.fetch().await?;
            let records: Vec<CatalogRecord> = entries.into_iter().map(|e| e.record).collect();

            if let Some(catalog) =
                persistence::try_load_snapshot(path, &self.embedder.id(), &records)
            {
                let summary = RebuildSummary {
                    records: catalog.len(),
                    dimension: catalog.dimension(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                };
                self.catalog.swap(catalog).await;
                return Ok(summary);
            }
        }

        self.rebuild(source).await
    }

    /// Embed every entry in batches and build an aligned catalog.
    async fn build_catalog(&self, entries: Vec<CorpusEntry>) -> Result<IndexedCatalog> {
        if entries.is_empty() {
            return Err(AppError::IndexBuildError("Corpus is empty".to_string()));
        }

        let texts: Vec<String> = entries.iter().map(|e| e.display_text.clone()).collect();
        let mut batches: Vec<Array2<f32>> = Vec::with_capacity(texts.len() / self.batch_size + 1);

        for chunk in texts.chunks(self.batch_size) {
            let batch = self.embedder.embed(chunk).await?;
            if batch.nrows() != chunk.len() {
                return Err(AppError::IndexBuildError(format!(
                    "Embedder returned {} vectors for {} texts",
                    batch.nrows(),
                    chunk.len()
                )));
            }
            if let Some(first) = batches.first() {
                if first.ncols() != batch.ncols() {
                    return Err(AppError::IndexBuildError(format!(
                        "Inconsistent embedding dimension: {} vs {}",
                        first.ncols(),
                        batch.ncols()
                    )));
                }
            }
            batches.push(batch);
        }

        let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
        let embeddings = concatenate(Axis(0), &views)
            .map_err(|e| AppError::IndexBuildError(format!("Failed to stack embeddings: {}", e)))?;

        let records = entries.into_iter().map(|e| e.record).collect();
        IndexedCatalog::build(records, embeddings)
    }
}

/// Walk candidates in order, dropping repeats, until both the floor of two
/// results and the desired count are met.
fn collect_distinct<'a>(
    candidates: impl IntoIterator<Item = &'a CatalogRecord>,
    desired_count: usize,
) -> Vec<CatalogRecord> {
    let mut results: Vec<CatalogRecord> = Vec::new();

    for record in candidates {
        if !results.contains(record) {
            results.push(record.clone());
        }
        if results.len() >= MIN_DISTINCT_RESULTS && results.len() >= desired_count {
            break;
        }
    }

    results
}
