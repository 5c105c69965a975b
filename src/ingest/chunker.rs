use super::loader::LoadedDocument;
use super::metadata::sha256_hex;
use crate::config::IndexingConfig;
use serde::{Deserialize, Serialize};

/// Per-chunk metadata carried into the vector and lexical indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub file_type: String,
    pub file_size: u64,
    /// Source file modification time, unix seconds
    pub modified_time: i64,
    pub content_hash: String,
    pub chunk_hash: String,
}

/// A bounded slice of a document, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub metadata: ChunkMetadata,
}

/// File-level facts shared by every chunk of one document
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_size: u64,
    pub modified_time: i64,
    pub content_hash: String,
}

/// Split a loaded document into overlapping chunks
pub fn chunk_document(doc: &LoadedDocument, source: &SourceInfo, config: &IndexingConfig) -> Vec<Chunk> {
    split_text(&doc.text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            metadata: ChunkMetadata {
                source_file: doc.source_file.clone(),
                file_type: doc.file_type.clone(),
                file_size: source.file_size,
                modified_time: source.modified_time,
                content_hash: source.content_hash.clone(),
                chunk_hash: sha256_hex(text.as_bytes()),
            },
            text,
            index,
        })
        .collect()
}

/// Split text into windows of `size` characters overlapping by `overlap`.
///
/// Lengths are counted in chars, so multi-byte text is never cut mid-sequence.
/// A window that does not reach the end of the text is shortened to the last
/// paragraph break, line break or whitespace in its final 20%, in that order.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + size).min(total);
        let cut = if end < total {
            find_break(&chars, end.saturating_sub(size / 5).max(start + 1), end).unwrap_or(end)
        } else {
            end
        };

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if cut >= total {
            break;
        }

        let next = cut.saturating_sub(overlap);
        start = if next > start { next } else { cut };
    }

    chunks
}

/// Position just past the preferred break in `chars[from..to]`
fn find_break(chars: &[char], from: usize, to: usize) -> Option<usize> {
    if from >= to {
        return None;
    }
    let window = &chars[from..to];

    let paragraph = window
        .windows(2)
        .rposition(|pair| pair[0] == '\n' && pair[1] == '\n')
        .map(|i| from + i + 2);
    if paragraph.is_some() {
        return paragraph;
    }

    let newline = window.iter().rposition(|c| *c == '\n').map(|i| from + i + 1);
    if newline.is_some() {
        return newline;
    }

    window.iter().rposition(|c| c.is_whitespace()).map(|i| from + i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceInfo {
        SourceInfo {
            file_size: 1234,
            modified_time: 1_700_000_000,
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(split_text("", 100, 20).is_empty());
        assert!(split_text("   \n\t ", 100, 20).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hola mundo", 1000, 200);
        assert_eq!(chunks, vec!["Hola mundo".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = "palabra ".repeat(500);
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
        // consecutive chunks share text
        let tail: String = chunks[0].chars().rev().take(50).collect::<Vec<_>>().into_iter().rev().collect();
        assert!(chunks[1].contains(tail.trim()));
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let first = "a".repeat(85);
        let second = "b".repeat(60);
        let text = format!("{}\n\n{}", first, second);
        let chunks = split_text(&text, 100, 10);
        assert_eq!(chunks[0], first);
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "ñ".repeat(250);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            assert!(chunk.chars().all(|c| c == 'ñ'));
        }
    }

    #[test]
    fn test_overlap_larger_than_progress_terminates() {
        let text = "x".repeat(50);
        let chunks = split_text(&text, 10, 10);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 50);
    }

    #[test]
    fn test_chunk_document_metadata() {
        let doc = LoadedDocument {
            text: "Procedimiento de compras. ".repeat(100),
            source_file: "compras.pdf".to_string(),
            file_type: "pdf".to_string(),
        };
        let config = IndexingConfig::default();
        let chunks = chunk_document(&doc, &source(), &config);

        assert!(chunks.len() >= 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.metadata.source_file, "compras.pdf");
            assert_eq!(chunk.metadata.file_type, "pdf");
            assert_eq!(chunk.metadata.file_size, 1234);
            assert_eq!(chunk.metadata.content_hash, "abc");
            assert_eq!(chunk.metadata.chunk_hash, sha256_hex(chunk.text.as_bytes()));
        }
    }
}
