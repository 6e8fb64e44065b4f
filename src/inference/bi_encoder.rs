//! Local sentence encoder (e.g. all-MiniLM-L6-v2 exported to ONNX).
//!
//! Query and catalog texts are encoded independently; each vector is the mean
//! of the token states under the attention mask, L2-normalized.

use crate::error::{AppError, Result};
use crate::inference::{EmbeddingProvider, SessionPool, TokenizerWrapper};
use async_trait::async_trait;
use ndarray::{Array2, ArrayView3};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How long a caller waits for a free session before giving up.
const SESSION_WAIT: Duration = Duration::from_secs(30);

pub struct BiEncoderEmbedder {
    inner: Arc<Inner>,
    /// One permit per pooled session, so `SessionPool::acquire` never misses.
    permits: Arc<Semaphore>,
}

struct Inner {
    pool: SessionPool,
    tokenizer: TokenizerWrapper,
    model_id: String,
}

impl BiEncoderEmbedder {
    /// Load the encoder and its tokenizer.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer JSON file
    /// * `max_length` - Maximum sequence length in tokens
    /// * `pool_size` - Number of sessions (typically CPU core count)
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let tokenizer = TokenizerWrapper::load(tokenizer_path, max_length)?;
        let pool = SessionPool::load(model_path, pool_size)?;
        let permits = Arc::new(Semaphore::new(pool.size()));

        tracing::info!(
            model = %model_path.display(),
            max_length,
            "Bi-encoder model loaded"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                tokenizer,
                model_id: format!("onnx:{}", model_path.display()),
            }),
            permits,
        })
    }
}

impl Inner {
    fn encode_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        let (input_ids, attention_mask, token_type_ids) = self.tokenizer.tokenize_batch(texts)?;
        let (batch_size, seq_len) = input_ids.dim();
        let shape = [batch_size, seq_len];

        let input_ids_tensor =
            Tensor::from_array((shape, input_ids.iter().copied().collect::<Vec<_>>()))
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape, attention_mask.iter().copied().collect::<Vec<_>>()))
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?;
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.iter().copied().collect::<Vec<_>>()))
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?;

        let mut pooled = self.pool.acquire()?;
        let outputs = pooled
            .session()
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::EmbeddingError(format!("Bi-encoder inference failed: {}", e)))?;

        // (batch, seq_len, hidden_size)
        let hidden_state = outputs.get("last_hidden_state").ok_or_else(|| {
            AppError::EmbeddingError("No 'last_hidden_state' output found".to_string())
        })?;
        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::EmbeddingError(e.to_string()))?;

        if shape_info.len() != 3 {
            return Err(AppError::EmbeddingError(format!(
                "Expected 3-d hidden state, got {} dims",
                shape_info.len()
            )));
        }
        let hidden_size = shape_info[2] as usize;
        let states = ArrayView3::from_shape((batch_size, seq_len, hidden_size), data)
            .map_err(|e| AppError::EmbeddingError(format!("Unexpected output shape: {}", e)))?;

        Ok(mean_pool_normalized(states, &attention_mask))
    }
}

/// Mean of token states under the mask, then L2 normalization per row.
fn mean_pool_normalized(states: ArrayView3<'_, f32>, attention_mask: &Array2<i64>) -> Array2<f32> {
    let (batch_size, seq_len, hidden_size) = states.dim();
    let mut embeddings = Array2::<f32>::zeros((batch_size, hidden_size));

    for i in 0..batch_size {
        let mut row = embeddings.row_mut(i);
        let mut count = 0.0f32;

        for j in 0..seq_len {
            if attention_mask[[i, j]] == 1 {
                row += &states.slice(ndarray::s![i, j, ..]);
                count += 1.0;
            }
        }

        if count > 0.0 {
            row /= count;
        }

        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }

    embeddings
}

#[async_trait]
impl EmbeddingProvider for BiEncoderEmbedder {
    fn id(&self) -> String {
        self.inner.model_id.clone()
    }

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let _permit = tokio::time::timeout(SESSION_WAIT, self.permits.acquire())
            .await
            .map_err(|_| {
                AppError::EmbeddingError("Embedding sessions busy, please retry".to_string())
            })?
            .map_err(|_| AppError::EmbeddingError("Semaphore closed".to_string()))?;

        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || inner.encode_batch(&texts))
            .await
            .map_err(|e| AppError::EmbeddingError(format!("Task join error: {}", e)))?
    }
}
