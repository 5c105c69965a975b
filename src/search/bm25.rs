use super::{assign_ranks, MetadataFilter, SearchResult};
use crate::db::Db;
use crate::error::Result;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

/// Words that carry no retrieval signal in Spanish or English questions
const STOP_WORDS: &[&str] = &[
    // es
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "en", "y", "o", "que",
    "qué", "es", "son", "se", "por", "para", "con", "sin", "su", "sus", "lo", "le", "les", "me", "mi",
    "como", "cómo", "cual", "cuál", "cuales", "cuáles", "donde", "dónde", "cuando", "cuándo", "este",
    "esta", "estos", "estas", "ese", "esa", "hay", "según", "sobre", "entre", "muy", "más", "pero",
    // en
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from",
    "as", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "what",
    "which", "who", "where", "when", "why", "how", "this", "that", "these", "those",
];

/// Turn free text into an FTS5 `MATCH` expression.
///
/// Keeps alphanumeric terms of two or more chars that are not stop words,
/// quotes each one (so FTS5 operators in user text are inert) and OR-joins
/// them for recall. Returns `None` when nothing searchable is left.
pub fn sanitize_fts5_query(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    let mut terms: Vec<&str> = Vec::new();
    for term in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.contains(t))
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Map a raw FTS5 bm25 score (negative, lower is better) into (0, 1), higher is better
pub fn normalize_bm25_score(raw_score: f64) -> f32 {
    if raw_score.is_nan() || raw_score.is_infinite() {
        return 0.0;
    }
    (1.0 / (1.0 + raw_score.exp())) as f32
}

/// Lexical top-k over `chunks_fts`, restricted by `filter`
pub async fn search_bm25(
    db: &Db,
    query: &str,
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<SearchResult>> {
    let start = std::time::Instant::now();

    let match_expr = match sanitize_fts5_query(query) {
        Some(expr) => expr,
        None => return Ok(Vec::new()),
    };
    if k == 0 {
        return Ok(Vec::new());
    }

    let (predicate, filter_values) = filter.map(|f| f.sql_predicate("c")).unwrap_or_default();

    let mut rows = db
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
                    bm25(chunks_fts) AS raw_score
                FROM chunks_fts
                JOIN chunks c ON c.id = chunks_fts.rowid
                WHERE chunks_fts MATCH ?{}
                ORDER BY raw_score
                LIMIT ?
                "#,
                predicate
            );

            let mut values = Vec::with_capacity(filter_values.len() + 2);
            values.push(Value::Text(match_expr));
            values.extend(filter_values);
            values.push(Value::Integer(k as i64));

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_score: f64 = row.get(6)?;
                results.push(SearchResult {
                    chunk_id: row.get(0)?,
                    content: row.get(1)?,
                    source_file: row.get(2)?,
                    file_type: row.get(3)?,
                    file_size: row.get::<_, i64>(4)?.max(0) as u64,
                    modified_time: row.get(5)?,
                    score: normalize_bm25_score(raw_score),
                    rank: 0,
                });
            }
            Ok(results)
        })
        .await?;

    assign_ranks(&mut rows);
    log::debug!("BM25 search took {:?}, returned {} results", start.elapsed(), rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::db_writer::replace_file_chunks;
    use crate::ingest::db_writer::tests::{make_chunk, setup_test_db};

    async fn seed(db: &Db) {
        replace_file_chunks(
            db,
            "procedimientos.pdf",
            vec![
                make_chunk("procedimientos.pdf", "pdf", 0, "El procedimiento de compras requiere tres cotizaciones"),
                make_chunk("procedimientos.pdf", "pdf", 1, "La política de viajes cubre hospedaje"),
            ],
            vec![vec![1.0], vec![1.0]],
        )
        .await
        .unwrap();
        replace_file_chunks(
            db,
            "notas.txt",
            vec![make_chunk("notas.txt", "txt", 0, "Notas sueltas sobre compras de oficina")],
            vec![vec![1.0]],
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_sanitize_quotes_and_or_joins() {
        assert_eq!(
            sanitize_fts5_query("¿Cuál es el procedimiento de compras?").as_deref(),
            Some("\"procedimiento\" OR \"compras\"")
        );
    }

    #[test]
    fn test_sanitize_neutralizes_fts_syntax() {
        let q = sanitize_fts5_query("NEAR(\"x\" * y) AND -z'").unwrap();
        assert!(!q.contains('*'));
        assert!(!q.contains('('));
        assert!(q.contains("\"near\""));
    }

    #[test]
    fn test_sanitize_only_stop_words() {
        assert_eq!(sanitize_fts5_query("¿qué es el?"), None);
        assert_eq!(sanitize_fts5_query("   "), None);
    }

    #[test]
    fn test_normalize_bm25_score() {
        assert!(normalize_bm25_score(-5.0) > 0.99);
        assert!((normalize_bm25_score(0.0) - 0.5).abs() < 1e-6);
        assert_eq!(normalize_bm25_score(f64::NAN), 0.0);
    }

    #[tokio::test]
    async fn test_search_bm25_ranks_matches() {
        let (db, _temp_dir) = setup_test_db().await;
        seed(&db).await;

        let results = search_bm25(&db, "procedimiento de compras", 5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source_file, "procedimientos.pdf");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_search_bm25_diacritics_insensitive() {
        let (db, _temp_dir) = setup_test_db().await;
        seed(&db).await;

        let results = search_bm25(&db, "politica", 5, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("política"));
    }

    #[tokio::test]
    async fn test_search_bm25_with_filter() {
        let (db, _temp_dir) = setup_test_db().await;
        seed(&db).await;

        let filter = MetadataFilter {
            file_type: Some("txt".to_string()),
            ..Default::default()
        };
        let results = search_bm25(&db, "compras", 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_file, "notas.txt");
    }

    #[tokio::test]
    async fn test_search_bm25_empty_query() {
        let (db, _temp_dir) = setup_test_db().await;
        seed(&db).await;
        assert!(search_bm25(&db, "", 5, None).await.unwrap().is_empty());
    }
}
