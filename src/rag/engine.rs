use super::prompt::{self, ContextDoc};
use crate::config::{Config, IndexingConfig, SearchConfig};
use crate::db::Db;
use crate::embeddings::{Embedder, OllamaEmbedder};
use crate::error::{RagchatError, Result};
use crate::files::{FileEntry, FileManager, UploadOutcome};
use crate::indexer::{IncrementalIndexer, IndexEntry, IndexStats};
use crate::ingest::{self, DocumentLoader, FileFingerprint, FileLoader};
use crate::intent::IntentDetector;
use crate::llm::{LanguageModel, OllamaClient};
use crate::search::{self, HybridParams, MetadataFilter, MetadataHit};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    AutoRag,
    AutoSimple,
    SimpleFallback,
    ForcedRag,
    Fallback,
    ForcedSimple,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::AutoRag => "auto_rag",
            ChatMode::AutoSimple => "auto_simple",
            ChatMode::SimpleFallback => "simple_fallback",
            ChatMode::ForcedRag => "forced_rag",
            ChatMode::Fallback => "fallback",
            ChatMode::ForcedSimple => "forced_simple",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub used_rag: bool,
    /// "rag" or "simple"
    pub source: &'static str,
    pub mode: ChatMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReindexReport {
    pub status: String,
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedFile>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagStats {
    pub initialized: bool,
    /// "initialized" or "no_initialized"
    pub status: &'static str,
    /// "hybrid" or "simple"
    pub mode: &'static str,
    /// Chunks in the index
    pub document_count: usize,
    pub indexed_file_count: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCapabilities {
    pub general_intents: Vec<String>,
    pub rag_intents: Vec<String>,
    pub metadata_filters: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    #[serde(flatten)]
    pub rag: RagStats,
    pub index: IndexStats,
    pub intent_detection: IntentCapabilities,
    pub incremental_indexing: bool,
    pub metadata_search: bool,
    pub chat_model: String,
    pub embedding_model: String,
}

/// Backends the engine talks to
pub struct Collaborators {
    pub db: Db,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LanguageModel>,
    pub loader: Arc<dyn DocumentLoader>,
    pub detector: Arc<IntentDetector>,
}

/// Shared state behind every request: readiness flag, sidecar owners and
/// the collaborators used to answer.
///
/// Each sidecar has exactly one owner behind a mutex, and `rebuild` keeps
/// index rebuilds from overlapping.
pub struct RagEngine {
    db: Db,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    loader: Arc<dyn DocumentLoader>,
    detector: Arc<IntentDetector>,
    files: Mutex<FileManager>,
    indexer: Mutex<IncrementalIndexer>,
    rebuild: Mutex<()>,
    initialized: AtomicBool,
    search: SearchConfig,
    indexing: IndexingConfig,
}

impl RagEngine {
    pub fn new(parts: Collaborators, config: &Config) -> Result<Self> {
        let files = FileManager::open(config.data_dir(), &config.ragchat.file_metadata_path)?;
        let indexer = IncrementalIndexer::open(&config.ragchat.index_state_path, config.indexing.max_age_days);
        Ok(Self {
            db: parts.db,
            embedder: parts.embedder,
            llm: parts.llm,
            loader: parts.loader,
            detector: parts.detector,
            files: Mutex::new(files),
            indexer: Mutex::new(indexer),
            rebuild: Mutex::new(()),
            initialized: AtomicBool::new(false),
            search: config.search.clone(),
            indexing: config.indexing.clone(),
        })
    }

    /// Wire the Ollama clients, file loader and index database from `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Db::open(config.db_path(), &config.ragchat.migrations_dir).await?;
        let parts = Collaborators {
            db,
            embedder: Arc::new(OllamaEmbedder::from_config(&config.ollama)?),
            llm: Arc::new(OllamaClient::from_config(&config.ollama)?),
            loader: Arc::new(FileLoader::new()),
            detector: Arc::new(IntentDetector::from_config(&config.intent)?),
        };
        let engine = Self::new(parts, config)?;
        engine.refresh_readiness().await?;
        Ok(engine)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Mark RAG available when the index already holds chunks
    pub async fn refresh_readiness(&self) -> Result<bool> {
        let ready = ingest::count_chunks(&self.db).await? > 0;
        self.initialized.store(ready, Ordering::SeqCst);
        Ok(ready)
    }

    /// Answer `message`.
    ///
    /// `use_rag` overrides intent detection: `Some(true)` forces retrieval,
    /// `Some(false)` skips it. Filters, when they restrict anything, replace
    /// hybrid retrieval with metadata-filtered search.
    pub async fn query(&self, message: &str, use_rag: Option<bool>, filters: Option<MetadataFilter>) -> ChatReply {
        let available = self.is_initialized();
        match (use_rag, available) {
            (None, false) => self.simple_reply(message, ChatMode::SimpleFallback).await,
            (None, true) => {
                let decision = self.detector.should_use_rag(message);
                log::info!(
                    "Intent {} (confidence {:.2}) for {:?}",
                    decision.intent.intent_type.as_str(),
                    decision.intent.confidence,
                    message
                );
                if decision.use_rag {
                    self.rag_reply(message, filters.as_ref(), ChatMode::AutoRag, ChatMode::AutoSimple)
                        .await
                } else {
                    self.simple_reply(message, ChatMode::AutoSimple).await
                }
            }
            (Some(true), true) => {
                self.rag_reply(message, filters.as_ref(), ChatMode::ForcedRag, ChatMode::ForcedRag)
                    .await
            }
            (Some(true), false) => {
                let mut reply = self.simple_reply(message, ChatMode::Fallback).await;
                reply.reply = format!("{}{}", prompt::RAG_UNAVAILABLE_NOTICE, reply.reply);
                reply
            }
            (Some(false), _) => self.simple_reply(message, ChatMode::ForcedSimple).await,
        }
    }

    async fn simple_reply(&self, message: &str, mode: ChatMode) -> ChatReply {
        ChatReply {
            reply: self.complete(&prompt::simple_prompt(message)).await,
            used_rag: false,
            source: "simple",
            mode,
        }
    }

    /// Retrieve and answer with context; with nothing retrieved, answer
    /// directly under `empty_mode`
    async fn rag_reply(
        &self,
        message: &str,
        filters: Option<&MetadataFilter>,
        mode: ChatMode,
        empty_mode: ChatMode,
    ) -> ChatReply {
        let filters = filters.filter(|f| !f.is_unrestricted() || f.top_k.is_some());

        let docs = match self.retrieve(message, filters).await {
            Ok(docs) => docs,
            Err(e) => {
                log::warn!("Retrieval failed, answering without context: {}", e);
                return self.simple_reply(message, empty_mode).await;
            }
        };

        if docs.is_empty() {
            if filters.is_some() {
                return ChatReply {
                    reply: prompt::NO_FILTERED_RESULTS.to_string(),
                    used_rag: false,
                    source: "simple",
                    mode: empty_mode,
                };
            }
            log::info!("Nothing retrieved for {:?}", message);
            return self.simple_reply(message, empty_mode).await;
        }

        let context = prompt::build_context(&docs, self.search.context_char_budget);
        ChatReply {
            reply: self.complete(&prompt::rag_prompt(&context, message)).await,
            used_rag: true,
            source: "rag",
            mode,
        }
    }

    async fn retrieve(&self, message: &str, filters: Option<&MetadataFilter>) -> Result<Vec<ContextDoc>> {
        let top_k = self.search.context_top_k;
        let docs: Vec<ContextDoc> = match filters {
            Some(filter) => {
                let hits = self.metadata_search(message, filter).await?;
                log::info!("Filtered search returned {} results", hits.len());
                hits.into_iter().map(ContextDoc::from).collect()
            }
            None => {
                let params = HybridParams::from(&self.search);
                search::search_hybrid(&self.db, self.embedder.as_ref(), message, &params, None)
                    .await?
                    .into_iter()
                    .map(ContextDoc::from)
                    .collect()
            }
        };
        Ok(docs.into_iter().take(top_k).collect())
    }

    async fn complete(&self, prompt: &str) -> String {
        let start = std::time::Instant::now();
        match self.llm.complete(prompt).await {
            Ok(text) => {
                log::debug!("{} answered in {:?}", self.llm.model_name(), start.elapsed());
                text
            }
            Err(e) => {
                log::error!("Language model call failed: {}", e);
                prompt::APOLOGY.to_string()
            }
        }
    }

    /// Similarity search restricted by `filter`
    pub async fn metadata_search(&self, query: &str, filter: &MetadataFilter) -> Result<Vec<MetadataHit>> {
        search::search_with_metadata_filters(
            &self.db,
            self.embedder.as_ref(),
            query,
            filter,
            self.search.metadata_top_k,
        )
        .await
    }

    /// Bring the index in line with the data directory.
    ///
    /// `specific_files` limits the pass to those names; otherwise
    /// `incremental` picks only stale files and a full pass takes every file.
    /// Entries for files that disappeared are always dropped. Per-file
    /// failures are reported, not raised.
    pub async fn reindex(&self, incremental: bool, specific_files: Option<&[String]>) -> Result<ReindexReport> {
        let _rebuild = self.rebuild.lock().await;
        let start = std::time::Instant::now();

        let data_dir = self.files.lock().await.data_dir().to_path_buf();
        let files = tokio::task::spawn_blocking(move || ingest::discover_files(&data_dir))
            .await
            .map_err(|e| RagchatError::Io(std::io::Error::other(format!("blocking task failed: {}", e))))??;

        let mut report = ReindexReport::default();
        let mut indexer = self.indexer.lock().await;

        let present: HashSet<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        let mut gone: Vec<String> = indexer
            .indexed_filenames()
            .into_iter()
            .filter(|name| !present.contains(name.as_str()))
            .collect();
        for source in ingest::indexed_sources(&self.db).await? {
            if !present.contains(source.as_str()) && !gone.contains(&source) {
                gone.push(source);
            }
        }
        for name in gone {
            ingest::delete_file_chunks(&self.db, &name).await?;
            indexer.remove_file_from_index(&name)?;
            log::info!("Dropped {} from the index", name);
            report.removed.push(name);
        }

        let scope: Vec<FileFingerprint> = match specific_files {
            Some(names) => {
                for name in names.iter().filter(|n| !present.contains(n.as_str())) {
                    report.failed.push(FailedFile {
                        filename: name.clone(),
                        error: "file not found".to_string(),
                    });
                }
                files.iter().filter(|f| names.contains(&f.filename)).cloned().collect()
            }
            None if incremental => indexer.get_files_to_index(&files),
            None => files.clone(),
        };
        report.skipped = files.len() - scope.len();
        log::info!(
            "Reindex ({}): {} to process, {} skipped",
            if incremental { "incremental" } else { "full" },
            scope.len(),
            report.skipped
        );

        let mut embedding_down = false;
        for file in &scope {
            if embedding_down {
                report.failed.push(FailedFile {
                    filename: file.filename.clone(),
                    error: "embedding service unavailable".to_string(),
                });
                continue;
            }
            match ingest::ingest_file(
                &self.db,
                Arc::clone(&self.loader),
                self.embedder.as_ref(),
                file,
                &self.indexing,
            )
            .await
            {
                Ok(count) => {
                    indexer.mark_files_as_indexed(std::slice::from_ref(file), count)?;
                    report.files_processed += 1;
                    report.chunks_indexed += count;
                    log::info!("Indexed {} ({} chunks)", file.filename, count);
                }
                Err(e) => {
                    if matches!(e, RagchatError::Embedding(_)) {
                        embedding_down = true;
                    }
                    log::warn!("Skipping {}: {}", file.filename, e);
                    report.failed.push(FailedFile {
                        filename: file.filename.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        drop(indexer);

        let total = ingest::count_chunks(&self.db).await?;
        let ready = !embedding_down && total > 0;
        self.initialized.store(ready, Ordering::SeqCst);

        report.status = if embedding_down {
            "embedding_unavailable"
        } else if report.failed.is_empty() {
            "completed"
        } else {
            "completed_with_errors"
        }
        .to_string();

        if ready {
            log::info!("RAG ready: {} chunks indexed ({:?})", total, start.elapsed());
        } else {
            log::warn!("RAG unavailable after reindex ({} chunks); simple mode", total);
        }
        Ok(report)
    }

    /// Drop a file's chunks and index entry
    pub async fn remove_from_index(&self, filename: &str) -> Result<bool> {
        let _rebuild = self.rebuild.lock().await;
        let deleted = ingest::delete_file_chunks(&self.db, filename).await?;
        let had_entry = self.indexer.lock().await.remove_file_from_index(filename)?;
        if ingest::count_chunks(&self.db).await? == 0 {
            self.initialized.store(false, Ordering::SeqCst);
        }
        Ok(deleted > 0 || had_entry)
    }

    pub async fn upload_file(&self, filename: &str, bytes: &[u8], content_type: Option<&str>) -> Result<UploadOutcome> {
        self.files.lock().await.upload(filename, bytes, content_type)
    }

    /// Delete the stored file and forget it in the index. False when absent.
    pub async fn delete_file(&self, filename: &str) -> Result<bool> {
        let deleted = self.files.lock().await.delete(filename)?;
        if deleted {
            self.remove_from_index(filename).await?;
        }
        Ok(deleted)
    }

    pub async fn list_files(&self) -> Vec<FileEntry> {
        self.files.lock().await.list()
    }

    pub async fn file_count(&self) -> usize {
        self.files.lock().await.count()
    }

    pub async fn index_stats(&self) -> IndexStats {
        self.indexer.lock().await.get_index_stats()
    }

    pub async fn index_entry(&self, filename: &str) -> Option<IndexEntry> {
        self.indexer.lock().await.entry(filename).cloned()
    }

    pub async fn get_stats(&self) -> Result<RagStats> {
        let initialized = self.is_initialized();
        let document_count = ingest::count_chunks(&self.db).await?;
        let index = self.index_stats().await;
        Ok(RagStats {
            initialized,
            status: if initialized { "initialized" } else { "no_initialized" },
            mode: if initialized { "hybrid" } else { "simple" },
            document_count,
            indexed_file_count: index.total_indexed_files,
            total_chunks: index.total_chunks,
        })
    }

    pub async fn get_system_info(&self) -> Result<SystemInfo> {
        let rag = self.get_stats().await?;
        Ok(SystemInfo {
            metadata_search: rag.initialized,
            rag,
            index: self.index_stats().await,
            intent_detection: IntentCapabilities {
                general_intents: self.detector.general_categories(),
                rag_intents: self.detector.rag_categories(),
                metadata_filters: search::available_filters(),
            },
            incremental_indexing: true,
            chat_model: self.llm.model_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
        })
    }

    pub fn available_filters(&self) -> BTreeMap<&'static str, &'static str> {
        search::available_filters()
    }

    pub fn chat_model(&self) -> &str {
        self.llm.model_name()
    }
}
