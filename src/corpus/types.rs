//! Type definitions for corpus ingestion.

use crate::index::CatalogRecord;
use serde::Deserialize;

/// One catalog row ready for indexing.
///
/// `display_text` is what gets embedded; `record` is what search returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub display_text: String,
    pub record: CatalogRecord,
}

impl CorpusEntry {
    pub fn new(record: CatalogRecord) -> Self {
        Self {
            display_text: record.display_text(),
            record,
        }
    }
}

/// A numeric column that may arrive as a number or as text ("$12.99").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumericField::Number(n) => Some(*n),
            NumericField::Text(s) => s.trim().trim_start_matches('$').trim().parse().ok(),
        }
        .filter(|n| n.is_finite())
    }
}

/// A book as it appears in a CSV row or a remote catalog response, before
/// normalization. Unknown columns are ignored.
///
/// Alternate column names are separate fields so a source carrying both
/// spellings still parses; the canonical name wins when both are populated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBook {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub price: Option<NumericField>,
    #[serde(default)]
    pub stock_count: Option<NumericField>,
    #[serde(default)]
    pub stock: Option<NumericField>,
    #[serde(default)]
    pub average_rating: Option<NumericField>,
}

impl RawBook {
    /// Normalize into a corpus entry. Rows with neither title nor authors are
    /// dropped.
    pub fn into_entry(self) -> Option<CorpusEntry> {
        let title = non_empty(self.title).unwrap_or_default();
        let authors = non_empty(self.authors)
            .or_else(|| non_empty(self.author))
            .unwrap_or_default();
        if title.is_empty() && authors.is_empty() {
            return None;
        }

        let stock = self
            .stock_count
            .as_ref()
            .and_then(NumericField::as_f64)
            .or_else(|| self.stock.as_ref().and_then(NumericField::as_f64));

        let record = CatalogRecord {
            title,
            authors,
            genres: non_empty(self.genres).or_else(|| non_empty(self.tags)),
            isbn: non_empty(self.isbn),
            release_date: non_empty(self.release_date)
                .or_else(|| non_empty(self.publication_date)),
            price: self.price.as_ref().and_then(NumericField::as_f64),
            stock_count: stock
                .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
                .map(|n| n as u32),
            average_rating: self.average_rating.as_ref().and_then(NumericField::as_f64),
        };

        Some(CorpusEntry::new(record))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
