use super::chunker::Chunk;
use super::metadata::chunk_id;
use crate::db::Db;
use crate::embeddings::storage::embedding_to_blob;
use crate::error::{RagchatError, Result};
use rusqlite::params;

/// Replace every chunk of `source_file` with `chunks` in one transaction.
///
/// `embeddings[i]` belongs to `chunks[i]`. FTS5 triggers keep `chunks_fts` in
/// step with the inserts and deletes. Returns the number of chunks written.
pub async fn replace_file_chunks(
    db: &Db,
    source_file: &str,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
) -> Result<usize> {
    if chunks.len() != embeddings.len() {
        return Err(RagchatError::InvalidInput(format!(
            "{} chunks but {} embeddings for {}",
            chunks.len(),
            embeddings.len(),
            source_file
        )));
    }

    let source_file = source_file.to_string();
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE source_file = ?1", params![source_file])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (
                    chunk_id, source_file, file_type, file_size, modified_time,
                    content_hash, chunk_hash, chunk_index, chunk_text, embedding
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;

            for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
                let meta = &chunk.metadata;
                stmt.execute(params![
                    chunk_id(&source_file, chunk.index),
                    source_file,
                    meta.file_type,
                    meta.file_size as i64,
                    meta.modified_time,
                    meta.content_hash,
                    meta.chunk_hash,
                    chunk.index as i64,
                    chunk.text,
                    embedding_to_blob(embedding),
                ])?;
            }
        }

        tx.commit()?;
        Ok(chunks.len())
    })
    .await
}

/// Delete all chunks of a file; returns how many rows went away
pub async fn delete_file_chunks(db: &Db, source_file: &str) -> Result<usize> {
    let source_file = source_file.to_string();
    db.with_connection(move |conn| {
        let removed = conn.execute("DELETE FROM chunks WHERE source_file = ?1", params![source_file])?;
        Ok(removed)
    })
    .await
}

/// Total chunk rows in the index
pub async fn count_chunks(db: &Db) -> Result<usize> {
    db.with_connection(|conn| {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(n as usize)
    })
    .await
}

/// Distinct source files that currently have chunks, sorted
pub async fn indexed_sources(db: &Db) -> Result<Vec<String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT source_file FROM chunks ORDER BY source_file")?;
        let sources = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(sources)
    })
    .await
}
