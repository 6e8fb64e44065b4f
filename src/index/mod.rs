//! In-memory catalog index: vectors plus the records they describe.
//!
//! `IndexedCatalog` keeps the `VectorIndex` and `CatalogStore` in one immutable
//! value so row `i` of one always describes entry `i` of the other.
//! `CatalogIndex` owns the currently served `IndexedCatalog` and replaces it
//! wholesale when a rebuild completes.

pub mod catalog;
pub mod vector;

pub use catalog::{CatalogRecord, CatalogStore};
pub use vector::{Neighbor, VectorIndex};

use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// A built index and its positionally aligned records.
#[derive(Debug)]
pub struct IndexedCatalog {
    index: VectorIndex,
    store: CatalogStore,
}

impl IndexedCatalog {
    /// Pair an index with its store. Both must have the same number of entries.
    pub fn new(index: VectorIndex, store: CatalogStore) -> Result<Self> {
        if index.len() != store.len() {
            return Err(AppError::IndexBuildError(format!(
                "Index has {} vectors but catalog has {} records",
                index.len(),
                store.len()
            )));
        }

        Ok(Self { index, store })
    }

    /// Build from records and their embeddings, one row per record in order.
    pub fn build(records: Vec<CatalogRecord>, embeddings: Array2<f32>) -> Result<Self> {
        if records.is_empty() {
            return Err(AppError::IndexBuildError("Corpus is empty".to_string()));
        }

        Self::new(VectorIndex::new(embeddings)?, CatalogStore::new(records))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Nearest records to `query`, ascending distance.
    pub fn nearest(
        &self,
        query: ArrayView1<'_, f32>,
        count: usize,
    ) -> Result<Vec<(&CatalogRecord, f32)>> {
        self.index
            .search(query, count)?
            .into_iter()
            .map(|neighbor| {
                self.store
                    .get(neighbor.ordinal)
                    .map(|record| (record, neighbor.distance))
                    .ok_or_else(|| {
                        AppError::IndexBuildError(format!(
                            "Ordinal {} has no catalog record",
                            neighbor.ordinal
                        ))
                    })
            })
            .collect()
    }
}

/// Owner of the currently served catalog.
///
/// Readers take a cheap `Arc` clone under a short read lock and search without
/// holding it. A rebuild prepares the replacement off to the side and only
/// takes the write lock for the pointer swap.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    current: RwLock<Option<Arc<IndexedCatalog>>>,
    rebuild_lock: Mutex<()>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: IndexedCatalog) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(catalog))),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// The catalog being served, or `IndexNotReady` before the first build.
    pub async fn current(&self) -> Result<Arc<IndexedCatalog>> {
        self.current
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(AppError::IndexNotReady)
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Replace the served catalog. Returns the previous one, if any.
    pub async fn swap(&self, catalog: IndexedCatalog) -> Option<Arc<IndexedCatalog>> {
        let mut current = self.current.write().await;
        current.replace(Arc::new(catalog))
    }

    /// Serializes rebuilds: only one may run at a time.
    pub async fn lock_rebuild(&self) -> MutexGuard<'_, ()> {
        self.rebuild_lock.lock().await
    }
}
