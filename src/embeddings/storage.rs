//! Embedding vectors are stored as little-endian f32 BLOBs in `chunks.embedding`.

/// Encode a vector as little-endian f32 bytes
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`embedding_to_blob`]; `None` if the length is not a multiple of 4
pub fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    blob.chunks_exact(4)
        .map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_layout_is_little_endian() {
        let blob = embedding_to_blob(&[1.0]);
        assert_eq!(blob, 1.0f32.to_le_bytes().to_vec());
        assert_eq!(blob_to_embedding(&blob), Some(vec![1.0]));
    }

    #[test]
    fn test_invalid_length() {
        assert!(blob_to_embedding(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_empty_blob() {
        assert_eq!(blob_to_embedding(&[]), Some(Vec::new()));
    }
}
