pub mod ollama;

pub use ollama::OllamaClient;

use crate::error::Result;
use async_trait::async_trait;

/// Text completion backend.
///
/// One call per answer; the engine decides what to do when it fails.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}
