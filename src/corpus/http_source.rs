use crate::corpus::{CorpusEntry, CorpusSource, RawBook};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Catalog corpus fetched from a remote catalog service.
///
/// `GET <url>` must return a JSON array of book objects (`title`, `authors` or
/// `author`, plus optional fields). Objects that cannot be read are skipped.
#[derive(Debug, Clone)]
pub struct HttpCorpusSource {
    client: Client,
    url: String,
}

impl HttpCorpusSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                AppError::IndexBuildError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CorpusSource for HttpCorpusSource {
    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }

    async fn fetch(&self) -> Result<Vec<CorpusEntry>> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            AppError::IndexBuildError(format!("Catalog request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IndexBuildError(format!(
                "Catalog service returned {}",
                status
            )));
        }

        let books: Vec<Value> = response.json().await.map_err(|e| {
            AppError::IndexBuildError(format!("Catalog response is not a JSON array: {}", e))
        })?;

        Ok(books_to_entries(books))
    }
}

fn books_to_entries(books: Vec<Value>) -> Vec<CorpusEntry> {
    let total = books.len();
    let entries: Vec<CorpusEntry> = books
        .into_iter()
        .enumerate()
        .filter_map(|(idx, book)| match serde_json::from_value::<RawBook>(book) {
            Ok(raw) => raw.into_entry(),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "Skipping malformed catalog entry");
                None
            }
        })
        .collect();

    tracing::debug!(total, parsed = entries.len(), "Remote catalog parsed");
    entries
}
