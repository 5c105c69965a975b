pub mod ollama;
pub mod storage;

pub use ollama::OllamaEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Turns text into fixed-length vectors.
///
/// Documents and queries go through the same model; `embed_query` exists so
/// implementations can cache the short, repetitive query side.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(query).await
    }

    fn model_name(&self) -> &str;
}
