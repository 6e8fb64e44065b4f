//! Catalog records and the positional store aligned with the vector index.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One book in the catalog.
///
/// Equality covers every field; two records are the same search result only
/// when all of their populated fields match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub title: String,
    #[serde(alias = "author")]
    pub authors: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(
        default,
        alias = "publication_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, alias = "stock", skip_serializing_if = "Option::is_none")]
    pub stock_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

impl CatalogRecord {
    pub fn new(title: impl Into<String>, authors: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: authors.into(),
            genres: None,
            isbn: None,
            release_date: None,
            price: None,
            stock_count: None,
            average_rating: None,
        }
    }

    /// Text fed to the embedder for this record.
    pub fn display_text(&self) -> String {
        format!("{} by {}", self.title, self.authors)
    }

    /// Single human-readable line with every populated field.
    ///
    /// Format: "<title> by <authors>; genres: ..; isbn: ..; released: ..; price: ..; in stock: ..; rating: .."
    pub fn summary_line(&self) -> String {
        let mut line = self.display_text();

        // Writing to a String cannot fail.
        if let Some(genres) = &self.genres {
            let _ = write!(line, "; genres: {}", genres);
        }
        if let Some(isbn) = &self.isbn {
            let _ = write!(line, "; isbn: {}", isbn);
        }
        if let Some(date) = &self.release_date {
            let _ = write!(line, "; released: {}", date);
        }
        if let Some(price) = self.price {
            let _ = write!(line, "; price: {:.2}", price);
        }
        if let Some(stock) = self.stock_count {
            let _ = write!(line, "; in stock: {}", stock);
        }
        if let Some(rating) = self.average_rating {
            let _ = write!(line, "; rating: {:.2}", rating);
        }

        line
    }
}

/// Records in index order. Position `i` describes vector `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStore {
    records: Vec<CatalogRecord>,
}

impl CatalogStore {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    pub fn get(&self, ordinal: usize) -> Option<&CatalogRecord> {
        self.records.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.records.iter()
    }
}
