use crate::error::{AppError, Result};
use ndarray::Array2;
use std::path::Path;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Padded model inputs for one batch: (input_ids, attention_mask, token_type_ids).
pub type EncodedBatch = (Array2<i64>, Array2<i64>, Array2<i64>);

/// Sentence tokenizer with truncation and batch-longest padding configured up front.
pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
}

impl TokenizerWrapper {
    pub fn load(tokenizer_path: &Path, max_length: usize) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| AppError::EmbeddingError(format!("Failed to load tokenizer: {}", e)))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| AppError::EmbeddingError(format!("Invalid truncation: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            path = %tokenizer_path.display(),
            max_length,
            "Tokenizer loaded successfully"
        );

        Ok(Self { tokenizer })
    }

    /// Tokenize independent texts for sentence embedding.
    pub fn tokenize_batch(&self, texts: &[String]) -> Result<EncodedBatch> {
        if texts.is_empty() {
            return Err(AppError::ValidationError(
                "Cannot tokenize an empty batch".to_string(),
            ));
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::EmbeddingError(format!("Tokenization failed: {}", e)))?;

        // Padding makes every row the same width
        let width = encodings.first().map(|e| e.len()).unwrap_or(0);

        Ok((
            stack(&encodings, width, Encoding::get_ids)?,
            stack(&encodings, width, Encoding::get_attention_mask)?,
            stack(&encodings, width, Encoding::get_type_ids)?,
        ))
    }
}

fn stack(encodings: &[Encoding], width: usize, field: fn(&Encoding) -> &[u32]) -> Result<Array2<i64>> {
    let flat: Vec<i64> = encodings
        .iter()
        .flat_map(|e| field(e).iter().map(|&v| v as i64))
        .collect();

    Array2::from_shape_vec((encodings.len(), width), flat)
        .map_err(|e| AppError::EmbeddingError(format!("Ragged token batch: {}", e)))
}
