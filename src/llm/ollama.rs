use super::LanguageModel;
use crate::config::OllamaConfig;
use crate::error::{RagchatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
    num_thread: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Non-streaming completions from a local Ollama server (`POST /api/generate`)
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    options: GenerateOptions,
}

impl OllamaClient {
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagchatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
                num_ctx: config.num_ctx,
                num_thread: config.num_thread,
            },
        })
    }

    /// Names of the models the server has pulled (`GET /api/tags`)
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| RagchatError::Llm(format!("Network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagchatError::Llm(format!("Ollama error {}", response.status())));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| RagchatError::Llm(format!("Failed to parse response: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagchatError::Llm(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RagchatError::Llm(format!("Ollama error {}: {}", status, body)));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagchatError::Llm(format!("Failed to parse response: {}", e)))?;

        log::debug!("LLM completion took {:?}", start.elapsed());
        Ok(result.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
