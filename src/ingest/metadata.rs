use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute SHA256 hash of file contents
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    Ok(sha256_hex(&content))
}

/// Stable chunk identifier: `<sha256(source_file)>::<index>`
pub fn chunk_id(source_file: &str, index: usize) -> String {
    format!("{}::{}", sha256_hex(source_file.as_bytes()), index)
}

/// Seconds since the unix epoch; times before it clamp to zero
pub fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
