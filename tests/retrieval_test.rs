//! Retrieval engine behavior against a deterministic keyword embedder.

mod common;

use async_trait::async_trait;
use common::{book, built_engine, entry, sample_corpus, KeywordEmbedder};
use ndarray::{concatenate, s, Array2, Axis};
use shelfwise::corpus::{CorpusEntry, CorpusSource, StaticCorpus};
use shelfwise::{AppError, CatalogIndex, EmbeddingProvider, Result, RetrievalEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Corpus source that always fails, like an unreachable catalog service.
struct BrokenCorpus;

#[async_trait]
impl CorpusSource for BrokenCorpus {
    fn describe(&self) -> String {
        "broken".to_string()
    }

    async fn fetch(&self) -> Result<Vec<CorpusEntry>> {
        Err(AppError::IndexBuildError("catalog unreachable".to_string()))
    }
}

/// How a `FaultyEmbedder` corrupts its second batch.
#[derive(Clone, Copy)]
enum Fault {
    ExtraColumn,
    MissingRow,
}

/// Keyword embedder that misbehaves on its second call.
struct FaultyEmbedder {
    fault: Fault,
    calls: AtomicUsize,
}

impl FaultyEmbedder {
    fn new(fault: Fault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FaultyEmbedder {
    fn id(&self) -> String {
        "faulty-test".to_string()
    }

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        let good = KeywordEmbedder::default().embed(texts).await?;
        if self.calls.fetch_add(1, Ordering::SeqCst) != 1 {
            return Ok(good);
        }

        Ok(match self.fault {
            Fault::ExtraColumn => {
                let pad = Array2::<f32>::zeros((good.nrows(), 1));
                concatenate(Axis(1), &[good.view(), pad.view()]).unwrap()
            }
            Fault::MissingRow => good.slice(s![..good.nrows() - 1, ..]).to_owned(),
        })
    }
}

// ============================================================================
// Search contract
// ============================================================================

#[tokio::test]
async fn test_search_before_build_is_not_ready() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let engine = RetrievalEngine::new(embedder.clone(), Arc::new(CatalogIndex::new()));

    let result = engine.search("dune", 3).await;

    assert!(matches!(result, Err(AppError::IndexNotReady)));
    assert_eq!(embedder.call_count(), 0, "query must not be embedded");
}

#[tokio::test]
async fn test_search_empty_query_rejected() {
    let (engine, _) = built_engine(sample_corpus()).await;

    assert!(matches!(engine.search("   ", 3).await, Err(AppError::EmptyQuery)));
}

#[tokio::test]
async fn test_search_ranks_by_distance_and_dedups() {
    let (engine, _) = built_engine(sample_corpus()).await;

    let results = engine.search("dune", 3).await.unwrap();
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();

    // The duplicated "Dune" row is collapsed; Emma wins the tie with Dragon Magic on ordinal
    assert_eq!(titles, vec!["Dune", "Dune Messiah", "Emma"]);
}

#[tokio::test]
async fn test_search_result_bounds() {
    let (engine, _) = built_engine(sample_corpus()).await;
    let distinct_in_catalog = 4;

    for desired in 1..=8 {
        let results = engine.search("dune herbert", desired).await.unwrap();

        assert!(results.len() <= desired.max(2), "desired={}", desired);
        assert!(
            results.len() >= desired.min(distinct_in_catalog).max(2),
            "desired={} got {}",
            desired,
            results.len()
        );

        for (i, record) in results.iter().enumerate() {
            assert!(!results[i + 1..].contains(record), "duplicate in results");
        }
    }
}

#[tokio::test]
async fn test_search_pads_to_two_distinct_records() {
    let corpus = vec![
        entry("Dune", "Frank Herbert"),
        entry("Dune Messiah", "Frank Herbert"),
    ];
    let (engine, _) = built_engine(corpus).await;

    let results = engine.search("space opera with a desert planet", 1).await.unwrap();

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_search_single_distinct_record_returns_one() {
    let corpus = vec![entry("Dune", "Frank Herbert"), entry("Dune", "Frank Herbert")];
    let (engine, _) = built_engine(corpus).await;

    let results = engine.search("space opera with a desert planet", 1).await.unwrap();

    assert_eq!(results, vec![book("Dune", "Frank Herbert")]);
}

#[tokio::test]
async fn test_search_margin_exhaustion_returns_partial() {
    // Ten copies of one book, margin 0: only the first `desired` neighbors are seen
    let corpus: Vec<_> = (0..10).map(|_| entry("Dune", "Frank Herbert")).collect();
    let embedder = Arc::new(KeywordEmbedder::default());
    let engine =
        RetrievalEngine::new(embedder, Arc::new(CatalogIndex::new())).with_margin(0);
    engine.rebuild(&StaticCorpus::new(corpus)).await.unwrap();

    let results = engine.search("dune", 3).await.unwrap();

    assert_eq!(results.len(), 1);
}

// ============================================================================
// Rebuild
// ============================================================================

#[tokio::test]
async fn test_rebuild_keeps_positions_aligned() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let engine = RetrievalEngine::new(embedder, Arc::new(CatalogIndex::new())).with_batch_size(2);

    let summary = engine.rebuild(&StaticCorpus::new(sample_corpus())).await.unwrap();
    assert_eq!(summary.records, 5);
    assert_eq!(summary.dimension, common::VOCABULARY.len());

    let catalog = engine.catalog().current().await.unwrap();
    for i in 0..catalog.len() {
        let record = catalog.store().get(i).unwrap();
        let expected = KeywordEmbedder::vector(&record.display_text());
        let row: Vec<f32> = catalog.index().vectors().row(i).to_vec();
        assert_eq!(row, expected, "ordinal {} misaligned", i);
    }
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (engine, _) = built_engine(sample_corpus()).await;
    let before = engine.search("dune herbert", 4).await.unwrap();

    engine.rebuild(&StaticCorpus::new(sample_corpus())).await.unwrap();
    let after = engine.search("dune herbert", 4).await.unwrap();

    assert_eq!(before, after);
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let (engine, _) = built_engine(sample_corpus()).await;

    let err = engine.rebuild(&BrokenCorpus).await.unwrap_err();
    assert!(matches!(err, AppError::IndexBuildError(_)));

    let results = engine.search("emma", 2).await.unwrap();
    assert_eq!(results[0].title, "Emma");
}

async fn assert_faulty_rebuild_keeps_catalog(fault: Fault) {
    let (engine, _) = built_engine(sample_corpus()).await;
    let served = engine.catalog().current().await.unwrap();

    let faulty = RetrievalEngine::new(
        Arc::new(FaultyEmbedder::new(fault)),
        Arc::clone(engine.catalog()),
    )
    .with_batch_size(2);
    let err = faulty
        .rebuild(&StaticCorpus::new(sample_corpus()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::IndexBuildError(_)), "got {:?}", err);
    let current = engine.catalog().current().await.unwrap();
    assert!(Arc::ptr_eq(&served, &current));
    assert_eq!(engine.search("emma", 2).await.unwrap()[0].title, "Emma");
}

#[tokio::test]
async fn test_rebuild_rejects_inconsistent_dimension() {
    assert_faulty_rebuild_keeps_catalog(Fault::ExtraColumn).await;
}

#[tokio::test]
async fn test_rebuild_rejects_short_batch() {
    assert_faulty_rebuild_keeps_catalog(Fault::MissingRow).await;
}

#[tokio::test]
async fn test_search_huge_count_returns_whole_catalog() {
    let (engine, _) = built_engine(sample_corpus()).await;

    let results = engine.search("dune", usize::MAX).await.unwrap();

    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn test_empty_corpus_rebuild_fails() {
    let (engine, _) = built_engine(sample_corpus()).await;

    let err = engine.rebuild(&StaticCorpus::new(Vec::new())).await.unwrap_err();

    assert!(matches!(err, AppError::IndexBuildError(_)));
    assert!(engine.catalog().is_ready().await);
}

#[tokio::test]
async fn test_concurrent_rebuilds_serialize() {
    let (engine, _) = built_engine(sample_corpus()).await;
    let source = StaticCorpus::new(sample_corpus());

    let (a, b) = tokio::join!(engine.rebuild(&source), engine.rebuild(&source));

    assert_eq!(a.unwrap().records, 5);
    assert_eq!(b.unwrap().records, 5);
    assert_eq!(engine.catalog().current().await.unwrap().len(), 5);
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test]
async fn test_load_or_rebuild_reuses_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.index");
    let source = StaticCorpus::new(sample_corpus());

    let first = RetrievalEngine::new(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(CatalogIndex::new()),
    )
    .with_snapshot_path(&path);
    first.load_or_rebuild(&source).await.unwrap();
    assert!(path.exists());

    let embedder = Arc::new(KeywordEmbedder::default());
    let second = RetrievalEngine::new(embedder.clone(), Arc::new(CatalogIndex::new()))
        .with_snapshot_path(&path);
    let summary = second.load_or_rebuild(&source).await.unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(embedder.call_count(), 0, "snapshot hit must not re-embed the corpus");
    assert_eq!(
        second.search("dune", 3).await.unwrap(),
        first.search("dune", 3).await.unwrap()
    );
}

#[tokio::test]
async fn test_load_or_rebuild_ignores_stale_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.index");

    let first = RetrievalEngine::new(
        Arc::new(KeywordEmbedder::default()),
        Arc::new(CatalogIndex::new()),
    )
    .with_snapshot_path(&path);
    first
        .load_or_rebuild(&StaticCorpus::new(sample_corpus()))
        .await
        .unwrap();

    let mut changed = sample_corpus();
    changed.push(entry("Magic Kingdom", "Terry Brooks"));

    let embedder = Arc::new(KeywordEmbedder::default());
    let second = RetrievalEngine::new(embedder.clone(), Arc::new(CatalogIndex::new()))
        .with_snapshot_path(&path);
    let summary = second
        .load_or_rebuild(&StaticCorpus::new(changed))
        .await
        .unwrap();

    assert_eq!(summary.records, 6);
    assert!(embedder.call_count() > 0);
}
