pub mod chunker;
pub mod db_writer;
pub mod loader;
pub mod metadata;
pub mod walker;

pub use chunker::{chunk_document, split_text, Chunk, ChunkMetadata, SourceInfo};
pub use db_writer::{count_chunks, delete_file_chunks, indexed_sources, replace_file_chunks};
pub use loader::{DocumentLoader, FileLoader, LoadedDocument};
pub use metadata::{chunk_id, compute_file_hash, sha256_hex};
pub use walker::{discover_files, FileFingerprint, DOCUMENT_EXTENSIONS};

use crate::config::IndexingConfig;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{RagchatError, Result};
use std::sync::Arc;
use tokio::task;

/// Run `loader` on the blocking pool; PDF and docx extraction are CPU bound.
///
/// A loader that panics fails only this file, as a `Parse` error.
pub async fn load_document(loader: Arc<dyn DocumentLoader>, file: &FileFingerprint) -> Result<Vec<LoadedDocument>> {
    let path = file.path.clone();
    task::spawn_blocking(move || loader.load(&path))
        .await
        .map_err(|e| RagchatError::Parse(format!("{}: loader aborted: {}", file.filename, e)))?
}

/// Load, chunk, embed and store one file, replacing any chunks it had.
///
/// Returns the number of chunks now in the index for the file.
pub async fn ingest_file(
    db: &Db,
    loader: Arc<dyn DocumentLoader>,
    embedder: &dyn Embedder,
    file: &FileFingerprint,
    config: &IndexingConfig,
) -> Result<usize> {
    let docs = load_document(loader, file).await?;
    let source = SourceInfo {
        file_size: file.size,
        modified_time: file.modified_time,
        content_hash: file.content_hash.clone(),
    };

    let mut chunks = Vec::new();
    for doc in &docs {
        for mut chunk in chunk_document(doc, &source, config) {
            // keep indices unique across multi-part documents
            chunk.index = chunks.len();
            chunk.metadata.source_file = file.filename.clone();
            chunks.push(chunk);
        }
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let start = std::time::Instant::now();
    let embeddings = embedder.embed_batch(&texts).await?;
    log::debug!(
        "Embedded {} chunks of {} in {:?}",
        texts.len(),
        file.filename,
        start.elapsed()
    );

    replace_file_chunks(db, &file.filename, chunks, embeddings).await
}
