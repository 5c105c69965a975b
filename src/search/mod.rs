pub mod bm25;
pub mod filters;
pub mod hybrid;
pub mod metadata;
pub mod vector;

pub use filters::{available_filters, FilterRequest, FilterValue, MetadataFilter};
pub use hybrid::{reciprocal_rank_fusion, search_hybrid, HybridParams};
pub use metadata::{search_with_metadata_filters, MetadataHit};

use serde::Serialize;

/// One retrieved chunk with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub content: String,
    pub source_file: String,
    pub file_type: String,
    pub file_size: u64,
    pub modified_time: i64,
    pub score: f32,
    /// 1-based position in the list it was returned in
    pub rank: usize,
}

/// Sort by score descending and number ranks from 1
pub(crate) fn assign_ranks(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (idx, result) in results.iter_mut().enumerate() {
        result.rank = idx + 1;
    }
}
