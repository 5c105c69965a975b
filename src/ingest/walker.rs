use super::loader::file_extension;
use super::metadata::{compute_file_hash, unix_seconds};
use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the data directory may hold
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "docx", "doc"];

/// Identity of a document on disk at the time it was scanned
#[derive(Debug, Clone, PartialEq)]
pub struct FileFingerprint {
    pub filename: String,
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
    /// Modification time, unix seconds
    pub modified_time: i64,
    pub content_hash: String,
}

impl FileFingerprint {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            extension: file_extension(path),
            size: metadata.len(),
            modified_time: unix_seconds(metadata.modified()?),
            content_hash: compute_file_hash(path)?,
        })
    }
}

/// Fingerprint every document directly inside `data_dir`.
///
/// Uploads are stored flat, so the walk does not descend. Hidden files, JSON
/// sidecars and unknown extensions are skipped. A missing directory yields an
/// empty list.
pub fn discover_files(data_dir: &Path) -> Result<Vec<FileFingerprint>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if !DOCUMENT_EXTENSIONS.contains(&file_extension(path).as_str()) {
            continue;
        }
        files.push(FileFingerprint::from_path(path)?);
    }

    log::debug!("Discovered {} files in {}", files.len(), data_dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("manual.pdf"), b"%PDF-1.4").unwrap();
        fs::write(root.join("notas.txt"), "texto").unwrap();
        fs::write(root.join("README.md"), "# Docs").unwrap();
        fs::write(root.join("file_metadata.json"), "{}").unwrap();
        fs::write(root.join(".oculto.txt"), "x").unwrap();
        fs::write(root.join("imagen.png"), b"\x89PNG").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/anidado.txt"), "x").unwrap();

        let files = discover_files(root).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["README.md", "manual.pdf", "notas.txt"]);

        let notas = files.iter().find(|f| f.filename == "notas.txt").unwrap();
        assert_eq!(notas.size, 5);
        assert_eq!(notas.extension, "txt");
        assert_eq!(notas.content_hash.len(), 64);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_files(&temp_dir.path().join("nope")).unwrap();
        assert!(files.is_empty());
    }
}
