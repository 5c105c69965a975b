use super::{assign_ranks, MetadataFilter, SearchResult};
use crate::db::Db;
use crate::embeddings::storage::blob_to_embedding;
use crate::embeddings::Embedder;
use crate::error::Result;
use rusqlite::params_from_iter;

/// Embed `query` and return the `k` most similar chunks
pub async fn search_vector(
    db: &Db,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let embed_start = std::time::Instant::now();
    let query_vec = embedder.embed_query(query).await?;
    log::debug!("Query embedding took {:?}", embed_start.elapsed());

    search_by_embedding(db, query_vec, k, filter).await
}

/// Full scan over stored embeddings with the metadata filter applied in SQL.
///
/// Rows whose embedding is unreadable or has a different dimension than the
/// query are skipped.
pub async fn search_by_embedding(
    db: &Db,
    query_vec: Vec<f32>,
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<SearchResult>> {
    let start = std::time::Instant::now();
    let (predicate, values) = filter.map(|f| f.sql_predicate("c")).unwrap_or_default();

    let mut results = db
        .with_connection(move |conn| {
            let sql = format!(
                r#"
                SELECT
                    c.chunk_id,
                    c.chunk_text,
                    c.source_file,
                    c.file_type,
                    c.file_size,
                    c.modified_time,
                    c.embedding
                FROM chunks c
                WHERE c.embedding IS NOT NULL{}
                "#,
                predicate
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut scored = Vec::new();
            let mut skipped = 0usize;
            while let Some(row) = rows.next()? {
                let blob: Vec<u8> = row.get(6)?;
                let embedding = match blob_to_embedding(&blob) {
                    Some(e) if e.len() == query_vec.len() => e,
                    _ => {
                        skipped += 1;
                        continue;
                    }
                };
                scored.push(SearchResult {
                    chunk_id: row.get(0)?,
                    content: row.get(1)?,
                    source_file: row.get(2)?,
                    file_type: row.get(3)?,
                    file_size: row.get::<_, i64>(4)?.max(0) as u64,
                    modified_time: row.get(5)?,
                    score: cosine_similarity(&query_vec, &embedding),
                    rank: 0,
                });
            }
            if skipped > 0 {
                log::warn!("Skipped {} chunks with mismatched embedding dimension", skipped);
            }
            Ok(scored)
        })
        .await?;

    assign_ranks(&mut results);
    results.truncate(k);
    log::debug!("Vector search took {:?}, returned {} results", start.elapsed(), results.len());
    Ok(results)
}

/// Cosine similarity; 0.0 when either vector has zero magnitude or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
