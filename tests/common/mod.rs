//! Shared fixtures: a deterministic embedder and a scripted language model.

#![allow(dead_code)]

use async_trait::async_trait;
use ndarray::Array2;
use shelfwise::chat::{ChatMessage, ModelClient, ToolCall, ToolSpec};
use shelfwise::corpus::{CorpusEntry, StaticCorpus};
use shelfwise::{CatalogIndex, CatalogRecord, Result, RetrievalEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Vocabulary of the keyword embedder. One dimension per word.
pub const VOCABULARY: &[&str] = &[
    "dune", "desert", "planet", "space", "herbert", "messiah", "emma", "austen", "romance",
    "dragon", "magic",
];

/// Embeds text as word counts over `VOCABULARY`.
///
/// Deterministic and dependency-free, so rankings are predictable in tests.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        VOCABULARY
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl shelfwise::EmbeddingProvider for KeywordEmbedder {
    fn id(&self) -> String {
        "keyword-test".to_string()
    }

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let flat: Vec<f32> = texts.iter().flat_map(|t| Self::vector(t)).collect();
        Ok(Array2::from_shape_vec((texts.len(), VOCABULARY.len()), flat)
            .expect("vocabulary-sized rows"))
    }
}

pub fn book(title: &str, authors: &str) -> CatalogRecord {
    CatalogRecord::new(title, authors)
}

pub fn entry(title: &str, authors: &str) -> CorpusEntry {
    CorpusEntry::new(book(title, authors))
}

/// A small catalog with one duplicated row.
pub fn sample_corpus() -> Vec<CorpusEntry> {
    vec![
        entry("Dune", "Frank Herbert"),
        entry("Dune Messiah", "Frank Herbert"),
        entry("Dune", "Frank Herbert"),
        entry("Emma", "Jane Austen"),
        entry("Dragon Magic", "Andre Norton"),
    ]
}

/// Engine over `entries`, already built.
pub async fn built_engine(entries: Vec<CorpusEntry>) -> (Arc<RetrievalEngine>, Arc<KeywordEmbedder>) {
    let embedder = Arc::new(KeywordEmbedder::default());
    let engine = Arc::new(RetrievalEngine::new(
        embedder.clone(),
        Arc::new(CatalogIndex::new()),
    ));
    engine
        .rebuild(&StaticCorpus::new(entries))
        .await
        .expect("test corpus builds");
    (engine, embedder)
}

/// One recorded model invocation.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub history: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

type Responder = dyn Fn(&[ChatMessage], &[ToolSpec]) -> Result<ChatMessage> + Send + Sync;

/// Language model stand-in driven by a closure. Records every call.
pub struct ScriptedModel {
    responder: Box<Responder>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new(
        responder: impl Fn(&[ChatMessage], &[ToolSpec]) -> Result<ChatMessage> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering, like a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always answers with the same plain content.
    pub fn replying(content: &'static str) -> Self {
        Self::new(move |_, _| Ok(ChatMessage::assistant(content)))
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, history: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        self.calls.lock().unwrap().push(ModelCall {
            history: history.to_vec(),
            tools: tools.iter().map(|t| t.name().to_string()).collect(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(history, tools)
    }
}

/// Assistant message carrying tool calls and no content.
pub fn tool_calls(calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        content: None,
        tool_calls: Some(calls),
        ..ChatMessage::assistant("")
    }
}
