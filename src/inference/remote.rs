use crate::error::{AppError, Result};
use crate::inference::EmbeddingProvider;
use async_trait::async_trait;
use ndarray::Array2;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for an OpenAI-compatible `POST /v1/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl RemoteEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::EmbeddingError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    fn id(&self) -> String {
        format!("remote:{}", self.model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError(format!(
                "Embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingError(format!("Malformed embedding response: {}", e))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::EmbeddingError(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // Entries may arrive out of order when `index` is present.
        if parsed.data.iter().all(|d| d.index.is_some()) {
            parsed.data.sort_by_key(|d| d.index);
        }

        rows_to_matrix(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Stack equal-length rows into a matrix.
pub(crate) fn rows_to_matrix(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let n = rows.len();
    let dim = rows.first().map(Vec::len).unwrap_or(0);

    if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
        return Err(AppError::EmbeddingError(format!(
            "Embedding {} has dimension {}, expected {}",
            bad,
            rows[bad].len(),
            dim
        )));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, dim), flat)
        .map_err(|e| AppError::EmbeddingError(format!("Failed to shape embeddings: {}", e)))
}
