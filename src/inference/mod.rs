//! Text embedding providers.
//!
//! The retrieval engine only needs `text -> vector`. `BiEncoderEmbedder` runs a
//! sentence encoder locally through ONNX Runtime; `RemoteEmbedder` calls an
//! OpenAI-compatible embeddings endpoint.

pub mod bi_encoder;
pub mod pool;
pub mod remote;
pub mod tokenize;

pub use bi_encoder::BiEncoderEmbedder;
pub use pool::SessionPool;
pub use remote::RemoteEmbedder;
pub use tokenize::TokenizerWrapper;

use crate::error::Result;
use async_trait::async_trait;
use ndarray::Array2;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identity of the underlying model. Vectors from providers with
    /// different ids are not comparable.
    fn id(&self) -> String;

    /// Embed `texts`, returning one row per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>>;
}
