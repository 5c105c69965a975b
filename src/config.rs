use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ragchat: RagchatConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
pub struct RagchatConfig {
    /// Directory holding uploaded documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// SQLite file backing the vector and lexical indexes.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_file_metadata_path")]
    pub file_metadata_path: PathBuf,
    #[serde(default = "default_index_state_path")]
    pub index_state_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RagchatConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: default_db_path(),
            migrations_dir: default_migrations_dir(),
            file_metadata_path: default_file_metadata_path(),
            index_state_path: default_index_state_path(),
            log_level: default_log_level(),
        }
    }
}

/// Local Ollama server settings (embeddings and generation)
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_num_thread")]
    pub num_thread: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub embedding_cache_capacity: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            num_thread: default_num_thread(),
            timeout_secs: default_timeout_secs(),
            embedding_cache_capacity: default_cache_capacity(),
        }
    }
}

/// Retrieval settings: hybrid fusion weights and result counts
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_vector_k")]
    pub vector_k: usize,
    #[serde(default = "default_lexical_k")]
    pub lexical_k: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
    /// Number of retrieved chunks placed in the prompt context.
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,
    /// Optional per-chunk character budget for the prompt context.
    #[serde(default)]
    pub context_char_budget: Option<usize>,
    /// Result count for metadata-filtered search when the request has no top_k.
    #[serde(default = "default_metadata_top_k")]
    pub metadata_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_k: default_vector_k(),
            lexical_k: default_lexical_k(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            context_top_k: default_context_top_k(),
            context_char_budget: None,
            metadata_top_k: default_metadata_top_k(),
        }
    }
}

/// Intent detection thresholds and optional external keyword tables
#[derive(Debug, Clone, Deserialize)]
pub struct IntentConfig {
    /// Minimum confidence for `should_use_rag`.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Score a bucket must exceed to be selected at all.
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f32,
    /// TOML file replacing the built-in keyword tables.
    #[serde(default)]
    pub patterns_file: Option<PathBuf>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            decision_threshold: default_decision_threshold(),
            patterns_file: None,
        }
    }
}

/// Chunking and freshness settings
#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Files indexed more than this many whole days ago are re-indexed.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_age_days: default_max_age_days(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./vector_store/index.db")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_file_metadata_path() -> PathBuf {
    PathBuf::from("./data/file_metadata.json")
}

fn default_index_state_path() -> PathBuf {
    PathBuf::from("./data/index_state.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_chat_model() -> String {
    "llama3.1:8b-instruct-q4_K_M".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_num_ctx() -> u32 {
    4096
}

fn default_num_thread() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_vector_k() -> usize {
    3
}

fn default_lexical_k() -> usize {
    2
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_lexical_weight() -> f32 {
    0.3
}

fn default_context_top_k() -> usize {
    3
}

fn default_metadata_top_k() -> usize {
    5
}

fn default_min_confidence() -> f32 {
    0.3
}

fn default_decision_threshold() -> f32 {
    0.3
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_age_days() -> i64 {
    7
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RAGCHAT_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (built-in defaults when absent)
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config = match std::env::var("RAGCHAT_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new("config.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    log::info!("No config.toml found, using built-in defaults");
                    Config::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without validating it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Invalid TOML configuration")?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.indexing.chunk_size == 0 {
            anyhow::bail!("indexing.chunk_size must be greater than 0");
        }

        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            anyhow::bail!("indexing.chunk_overlap must be less than chunk_size");
        }

        if self.indexing.max_age_days < 0 {
            anyhow::bail!("indexing.max_age_days must not be negative");
        }

        for (name, weight) in [
            ("search.vector_weight", self.search.vector_weight),
            ("search.lexical_weight", self.search.lexical_weight),
            ("intent.min_confidence", self.intent.min_confidence),
            ("intent.decision_threshold", self.intent.decision_threshold),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                anyhow::bail!("{} must be between 0.0 and 1.0", name);
            }
        }

        if self.search.vector_k + self.search.lexical_k == 0 {
            anyhow::bail!("search.vector_k and search.lexical_k cannot both be 0");
        }

        if self.search.context_top_k == 0 {
            anyhow::bail!("search.context_top_k must be greater than 0");
        }

        if self.ollama.embedding_model.trim().is_empty() || self.ollama.chat_model.trim().is_empty() {
            anyhow::bail!("ollama.embedding_model and ollama.chat_model must be set");
        }

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.ragchat.db_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.ragchat.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.search.vector_k, 3);
        assert_eq!(config.search.lexical_k, 2);
        assert!((config.search.vector_weight - 0.7).abs() < 1e-6);
        assert!((config.search.lexical_weight - 0.3).abs() < 1e-6);
        assert_eq!(config.indexing.chunk_size, 1000);
        assert_eq!(config.indexing.chunk_overlap, 200);
        assert_eq!(config.indexing.max_age_days, 7);
        assert_eq!(config.search.metadata_top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[ragchat]
data_dir = "/tmp/docs"

[search]
vector_weight = 0.6
lexical_weight = 0.4
"#,
        )
        .unwrap();
        assert_eq!(config.ragchat.data_dir, PathBuf::from("/tmp/docs"));
        assert_eq!(config.ragchat.db_path, PathBuf::from("./vector_store/index.db"));
        assert!((config.search.vector_weight - 0.6).abs() < 1e-6);
        assert_eq!(config.search.vector_k, 3);
        assert_eq!(config.http_server.port, 8000);
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let mut config = Config::default();
        config.indexing.chunk_overlap = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_validate_rejects_weight_out_of_range() {
        let mut config = Config::default();
        config.search.vector_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ragchat.toml");
        fs::write(&config_path, "[http_server]\nport = 9100\n").unwrap();

        let original = std::env::var("RAGCHAT_CONFIG").ok();
        std::env::set_var("RAGCHAT_CONFIG", config_path.to_str().unwrap());
        let config = Config::load();
        std::env::remove_var("RAGCHAT_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RAGCHAT_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.http_server.port, 9100);
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("RAGCHAT_CONFIG").ok();
        std::env::set_var("RAGCHAT_CONFIG", "nonexistent-ragchat.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("RAGCHAT_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RAGCHAT_CONFIG", v);
        }
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
        let config = Config::from_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.ollama.chat_model, "llama3.1:8b-instruct-q4_K_M");
        assert_eq!(config.http_server.max_upload_bytes, 50 * 1024 * 1024);
    }
}
