use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::config::OllamaConfig;
use crate::error::{RagchatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server (`POST /api/embeddings`).
///
/// One request per text; failures are reported once and never retried.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagchatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            cache: None,
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let embedder = Self::new(
            &config.base_url,
            &config.embedding_model,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(embedder.with_cache(Arc::new(EmbeddingCache::new(config.embedding_cache_capacity))))
    }

    /// Cache query embeddings in `cache`
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagchatError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RagchatError::Embedding(format!("Ollama error {}: {}", status, body)));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagchatError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embedding.is_empty() {
            return Err(RagchatError::Embedding(format!(
                "Model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(result.embedding)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&self.model, query) {
                log::debug!("Embedding cache hit for query");
                return Ok(cached);
            }
        }

        let embedding = self.embed(query).await?;
        if let Some(cache) = &self.cache {
            cache.put(&self.model, query, embedding.clone());
        }
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
