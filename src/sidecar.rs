//! JSON sidecar files: whole-document state persisted next to the data.
//!
//! Writes go to a uniquely named temp file in the same directory and are
//! renamed over the target, so readers never observe a half-written file.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Load `path`, or `T::default()` when it is absent.
///
/// A file that cannot be parsed is copied to `<path>.corrupted` and replaced
/// by the default value in memory.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            log::warn!("Cannot read {}: {}; starting empty", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            let backup = corrupted_path(path);
            log::warn!(
                "Corrupt state file {} ({}); backing up to {} and starting empty",
                path.display(),
                e,
                backup.display()
            );
            if let Err(copy_err) = std::fs::copy(path, &backup) {
                log::error!("Failed to back up {}: {}", path.display(), copy_err);
            }
            T::default()
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "state.json".to_string());
    let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

fn corrupted_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupted");
    PathBuf::from(name)
}
