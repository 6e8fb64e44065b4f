//! Corpus sources for index rebuilds.
//!
//! A source yields `(display text, record)` pairs in a stable order. It is only
//! consulted at rebuild time, never on the search path.

pub mod csv_source;
pub mod http_source;
pub mod types;

pub use csv_source::{parse_csv, CsvCorpusSource};
pub use http_source::HttpCorpusSource;
pub use types::{CorpusEntry, NumericField, RawBook};

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<CorpusEntry>>;
}

/// Fixed in-memory corpus, mostly useful for tests and seeding.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    entries: Vec<CorpusEntry>,
}

impl StaticCorpus {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CorpusSource for StaticCorpus {
    fn describe(&self) -> String {
        format!("static:{} entries", self.entries.len())
    }

    async fn fetch(&self) -> Result<Vec<CorpusEntry>> {
        Ok(self.entries.clone())
    }
}
