//! Catalog corpus read from a local CSV file.
//!
//! Expected header columns: `title`, `authors` (or `author`), and optionally
//! `genres`, `isbn`, `release_date`, `price`, `stock_count`, `average_rating`.
//! Other columns are ignored. Malformed rows are logged and skipped.

use crate::corpus::{CorpusEntry, CorpusSource, RawBook};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CsvCorpusSource {
    path: PathBuf,
}

impl CsvCorpusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CorpusSource for CsvCorpusSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<CorpusEntry>> {
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path).map_err(|e| {
                AppError::IndexBuildError(format!(
                    "Failed to open corpus {}: {}",
                    path.display(),
                    e
                ))
            })?;
            parse_csv(file)
        })
        .await
        .map_err(|e| AppError::IndexBuildError(format!("Task join error: {}", e)))?
    }
}

/// Parse catalog rows from CSV, keeping file order.
///
/// # Errors
/// Fails when the header has no `title` column, or when every data row fails
/// to parse. Individual bad rows are skipped (partial success model).
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<CorpusEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AppError::IndexBuildError(format!("Failed to read CSV header: {}", e)))?
        .clone();
    if !headers.iter().any(|h| h == "title") {
        return Err(AppError::IndexBuildError(
            "CSV corpus has no 'title' column".to_string(),
        ));
    }

    let mut entries = Vec::new();
    let mut failed = 0usize;
    let mut blank = 0usize;

    for (line, row) in csv_reader.deserialize::<RawBook>().enumerate() {
        match row {
            Ok(raw) => match raw.into_entry() {
                Some(entry) => entries.push(entry),
                None => blank += 1,
            },
            Err(e) => {
                failed += 1;
                tracing::warn!(row = line + 1, error = %e, "Skipping malformed CSV row");
            }
        }
    }

    if entries.is_empty() && failed > 0 {
        return Err(AppError::IndexBuildError(
            "All CSV rows failed to parse".to_string(),
        ));
    }

    tracing::debug!(
        parsed = entries.len(),
        failed,
        blank,
        "CSV corpus parsed"
    );

    Ok(entries)
}
