//! Deterministic collaborators for unit tests.

use crate::config::Config;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{RagchatError, Result};
use crate::ingest::loader::{file_extension, DocumentLoader, LoadedDocument};
use crate::intent::IntentDetector;
use crate::llm::LanguageModel;
use crate::rag::{Collaborators, RagEngine};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Bag-of-words embedder: each lowercase token bumps one of `dims` buckets.
pub struct HashingEmbedder {
    pub dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dims: 64 }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        Ok(v)
    }

    fn model_name(&self) -> &str {
        "hashing-test"
    }
}

/// Embedder whose backend is always down
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagchatError::Embedding("connection refused".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

/// Language model that records every prompt and answers with a fixed reply
pub struct RecordingLlm {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for RecordingLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| RagchatError::Llm("model not loaded".to_string()))
    }

    fn model_name(&self) -> &str {
        "recording-test"
    }
}

/// Loader serving canned text per filename; other files are read as UTF-8
#[derive(Default)]
pub struct StubLoader {
    texts: HashMap<String, String>,
}

impl StubLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, filename: &str, text: &str) -> Self {
        self.texts.insert(filename.to_string(), text.to_string());
        self
    }
}

impl DocumentLoader for StubLoader {
    fn supports(&self, extension: &str) -> bool {
        extension != "doc"
    }

    fn load(&self, path: &Path) -> Result<Vec<LoadedDocument>> {
        let extension = file_extension(path);
        if !self.supports(&extension) {
            return Err(RagchatError::UnsupportedFormat(path.display().to_string()));
        }
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = match self.texts.get(&source_file) {
            Some(text) => text.clone(),
            None => String::from_utf8_lossy(&std::fs::read(path)?).into_owned(),
        };
        Ok(vec![LoadedDocument {
            text,
            source_file,
            file_type: extension,
        }])
    }
}

/// Default config with every path under `root`
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.ragchat.data_dir = root.join("data");
    config.ragchat.db_path = root.join("vector_store").join("index.db");
    config.ragchat.migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    config.ragchat.file_metadata_path = root.join("data").join("file_metadata.json");
    config.ragchat.index_state_path = root.join("data").join("index_state.json");
    config
}

/// Engine over a fresh index under `root` with the built-in intent tables
pub async fn build_engine(
    root: &Path,
    embedder: Arc<dyn Embedder>,
    llm: Arc<RecordingLlm>,
    loader: StubLoader,
) -> RagEngine {
    let config = test_config(root);
    let db = Db::open(config.db_path(), &config.ragchat.migrations_dir).await.unwrap();
    let parts = Collaborators {
        db,
        embedder,
        llm,
        loader: Arc::new(loader),
        detector: Arc::new(IntentDetector::builtin().unwrap()),
    };
    RagEngine::new(parts, &config).unwrap()
}
