use super::{vector, MetadataFilter, SearchResult};
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::Result;
use serde::Serialize;

/// Chunk metadata as reported back to callers of the metadata search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitMetadata {
    pub chunk_id: String,
    pub source_file: String,
    pub file_type: String,
    pub file_size: u64,
    pub modified_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataHit {
    pub content: String,
    pub metadata: HitMetadata,
    pub source_file: String,
    pub file_type: String,
    pub score: f32,
}

impl From<SearchResult> for MetadataHit {
    fn from(r: SearchResult) -> Self {
        MetadataHit {
            metadata: HitMetadata {
                chunk_id: r.chunk_id,
                source_file: r.source_file.clone(),
                file_type: r.file_type.clone(),
                file_size: r.file_size,
                modified_time: r.modified_time,
            },
            content: r.content,
            source_file: r.source_file,
            file_type: r.file_type,
            score: r.score,
        }
    }
}

/// Similarity search restricted to chunks whose metadata satisfies `filter`.
///
/// Returns `filter.top_k` hits, or `default_top_k` when the filter has none.
pub async fn search_with_metadata_filters(
    db: &Db,
    embedder: &dyn Embedder,
    query: &str,
    filter: &MetadataFilter,
    default_top_k: usize,
) -> Result<Vec<MetadataHit>> {
    let k = filter.top_k.unwrap_or(default_top_k);
    let results = vector::search_vector(db, embedder, query, k, Some(filter)).await?;
    log::debug!("Metadata search returned {} results (k={})", results.len(), k);
    Ok(results.into_iter().map(MetadataHit::from).collect())
}
