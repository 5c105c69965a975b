use super::{bm25, vector, MetadataFilter, SearchResult};
use crate::config::SearchConfig;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::Result;
use std::collections::HashMap;

/// RRF damping constant
const RRF_K: f32 = 60.0;

/// Fixed shape of the hybrid retriever: how many hits each side contributes
/// and how much each side's ranks weigh in the fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridParams {
    pub vector_k: usize,
    pub lexical_k: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            vector_k: 3,
            lexical_k: 2,
            vector_weight: 0.7,
            lexical_weight: 0.3,
        }
    }
}

impl From<&SearchConfig> for HybridParams {
    fn from(config: &SearchConfig) -> Self {
        Self {
            vector_k: config.vector_k,
            lexical_k: config.lexical_k,
            vector_weight: config.vector_weight,
            lexical_weight: config.lexical_weight,
        }
    }
}

/// Vector and lexical retrieval run concurrently, merged with weighted RRF.
///
/// The result holds every distinct chunk either side returned, so at most
/// `vector_k + lexical_k` entries.
pub async fn search_hybrid(
    db: &Db,
    embedder: &dyn Embedder,
    query: &str,
    params: &HybridParams,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<SearchResult>> {
    let start = std::time::Instant::now();

    let (vector_results, lexical_results) = tokio::join!(
        vector::search_vector(db, embedder, query, params.vector_k, filter),
        bm25::search_bm25(db, query, params.lexical_k, filter),
    );
    let vector_results = vector_results?;
    let lexical_results = lexical_results?;

    log::debug!(
        "Hybrid search: {} vector + {} lexical hits in {:?}",
        vector_results.len(),
        lexical_results.len(),
        start.elapsed()
    );

    Ok(reciprocal_rank_fusion(
        vector_results,
        lexical_results,
        params.vector_weight,
        params.lexical_weight,
    ))
}

/// Weighted Reciprocal Rank Fusion.
///
/// ```text
/// score(d) = Σ weight_i / (60 + rank_i(d))
/// ```
/// with 1-based ranks. Chunks found by both lists accumulate both terms. Equal
/// scores keep first-seen order, vector list first.
pub fn reciprocal_rank_fusion(
    vector_results: Vec<SearchResult>,
    lexical_results: Vec<SearchResult>,
    vector_weight: f32,
    lexical_weight: f32,
) -> Vec<SearchResult> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut fused: Vec<SearchResult> = Vec::new();

    for (results, weight) in [(vector_results, vector_weight), (lexical_results, lexical_weight)] {
        for (rank, result) in results.into_iter().enumerate() {
            let rrf_score = weight / (RRF_K + (rank + 1) as f32);
            match position.get(&result.chunk_id) {
                Some(&idx) => fused[idx].score += rrf_score,
                None => {
                    position.insert(result.chunk_id.clone(), fused.len());
                    fused.push(SearchResult {
                        score: rrf_score,
                        ..result
                    });
                }
            }
        }
    }

    // stable sort keeps first-seen order on ties
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (idx, result) in fused.iter_mut().enumerate() {
        result.rank = idx + 1;
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::db_writer::replace_file_chunks;
    use crate::ingest::db_writer::tests::{make_chunk, setup_test_db};
    use crate::test_support::HashingEmbedder;

    fn create_result(chunk_id: &str, source_file: &str) -> SearchResult {
        SearchResult {
            chunk_id: chunk_id.to_string(),
            content: format!("content of {}", chunk_id),
            source_file: source_file.to_string(),
            file_type: "pdf".to_string(),
            file_size: 0,
            modified_time: 0,
            score: 0.0,
            rank: 0,
        }
    }

    #[test]
    fn test_rrf_overlap_accumulates() {
        let vector = vec![create_result("a", "x.pdf"), create_result("b", "x.pdf")];
        let lexical = vec![create_result("b", "x.pdf"), create_result("c", "y.pdf")];

        let fused = reciprocal_rank_fusion(vector, lexical, 0.7, 0.3);
        assert_eq!(fused.len(), 3);

        // b: 0.7/62 + 0.3/61 beats a: 0.7/61
        assert_eq!(fused[0].chunk_id, "b");
        assert!((fused[0].score - (0.7 / 62.0 + 0.3 / 61.0)).abs() < 1e-6);
        assert_eq!(fused[1].chunk_id, "a");
        assert_eq!(fused[2].chunk_id, "c");
        assert_eq!(fused.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rrf_vector_weight_dominates_disjoint_lists() {
        let vector = vec![create_result("v1", "a.pdf"), create_result("v2", "a.pdf"), create_result("v3", "a.pdf")];
        let lexical = vec![create_result("l1", "b.pdf"), create_result("l2", "b.pdf")];

        let fused = reciprocal_rank_fusion(vector, lexical, 0.7, 0.3);
        let ids: Vec<_> = fused.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3", "l1", "l2"]);
    }

    #[test]
    fn test_rrf_equal_weights_tie_keeps_vector_first() {
        let fused = reciprocal_rank_fusion(
            vec![create_result("v", "a.pdf")],
            vec![create_result("l", "b.pdf")],
            0.5,
            0.5,
        );
        assert_eq!(fused[0].chunk_id, "v");
        assert_eq!(fused[1].chunk_id, "l");
    }

    #[test]
    fn test_rrf_empty_inputs() {
        assert!(reciprocal_rank_fusion(vec![], vec![], 0.7, 0.3).is_empty());
        let fused = reciprocal_rank_fusion(vec![], vec![create_result("l", "b.pdf")], 0.7, 0.3);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.3 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_preserves_metadata() {
        let fused = reciprocal_rank_fusion(vec![create_result("a", "informe.pdf")], vec![], 0.7, 0.3);
        assert_eq!(fused[0].source_file, "informe.pdf");
        assert_eq!(fused[0].content, "content of a");
    }

    #[tokio::test]
    async fn test_search_hybrid_bounded_by_k_values() {
        let (db, _temp_dir) = setup_test_db().await;
        let embedder = HashingEmbedder::default();

        let texts = [
            "procedimiento de compras con tres cotizaciones",
            "procedimiento de vacaciones del personal",
            "manual de seguridad informática",
            "política de compras sustentables",
            "acta de la reunión anual",
        ];
        let mut chunks = Vec::new();
        let mut embeddings = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            chunks.push(make_chunk("docs.txt", "txt", i, text));
            embeddings.push(embedder.embed(text).await.unwrap());
        }
        replace_file_chunks(&db, "docs.txt", chunks, embeddings).await.unwrap();

        let results = search_hybrid(&db, &embedder, "procedimiento de compras", &HybridParams::default(), None)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 5);
        assert!(results[0].content.contains("compras"));

        let mut ids: Vec<_> = results.iter().map(|r| r.chunk_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }
}
