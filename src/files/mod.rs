//! Uploaded document store: a flat data directory plus a metadata sidecar.

use crate::error::{RagchatError, Result};
use crate::ingest::loader::file_extension;
use crate::ingest::{compute_file_hash, sha256_hex, DOCUMENT_EXTENSIONS};
use crate::sidecar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: String,
    pub size: u64,
    pub upload_time: DateTime<Utc>,
    /// Content type announced by the uploader
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub total_files: usize,
}

/// On-disk layout of the file metadata sidecar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    pub stats: FileStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Stored(FileRecord),
    /// Same bytes already stored under `existing`
    Duplicate { existing: String },
}

/// A document present in the data directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub metadata: Option<FileRecord>,
}

pub struct FileManager {
    data_dir: PathBuf,
    metadata_path: PathBuf,
    metadata: FileMetadata,
}

impl FileManager {
    /// Create `data_dir` if needed and load the sidecar at `metadata_path`
    pub fn open(data_dir: &Path, metadata_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let mut metadata: FileMetadata = sidecar::load_or_default(metadata_path);
        metadata.stats.total_files = metadata.files.len();
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            metadata_path: metadata_path.to_path_buf(),
            metadata,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Store `bytes` as `filename` unless the same content is already stored
    /// under another name. Re-uploading a name replaces its content.
    pub fn upload(&mut self, filename: &str, bytes: &[u8], content_type: Option<&str>) -> Result<UploadOutcome> {
        validate_filename(filename)?;
        let extension = file_extension(Path::new(filename));
        if !DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(RagchatError::UnsupportedFormat(format!(
                "{} (allowed: {})",
                filename,
                DOCUMENT_EXTENSIONS.join(", ")
            )));
        }

        let hash = sha256_hex(bytes);
        if let Some(existing) = self.find_duplicate(filename, &hash, bytes.len() as u64)? {
            log::info!("Upload {} duplicates {}; discarded", filename, existing);
            return Ok(UploadOutcome::Duplicate { existing });
        }

        std::fs::write(self.data_dir.join(filename), bytes)?;
        let record = FileRecord {
            hash,
            size: bytes.len() as u64,
            upload_time: Utc::now(),
            file_type: content_type.map(str::to_string),
        };
        self.metadata.files.insert(filename.to_string(), record.clone());
        self.save()?;
        log::info!("Stored {} ({} bytes)", filename, record.size);
        Ok(UploadOutcome::Stored(record))
    }

    /// Another stored document with `hash`. Recorded uploads are compared by their
    /// stored hash; files placed in the data directory by hand are hashed when
    /// their size matches.
    fn find_duplicate(&self, filename: &str, hash: &str, size: u64) -> Result<Option<String>> {
        if let Some((existing, _)) = self
            .metadata
            .files
            .iter()
            .find(|(name, record)| name.as_str() != filename && record.hash == hash)
        {
            return Ok(Some(existing.clone()));
        }

        for entry in self.list() {
            if entry.metadata.is_some() || entry.filename == filename || entry.size != size {
                continue;
            }
            if compute_file_hash(&self.data_dir.join(&entry.filename))? == hash {
                return Ok(Some(entry.filename));
            }
        }
        Ok(None)
    }

    /// Remove the file and its record. False when the file was not on disk.
    pub fn delete(&mut self, filename: &str) -> Result<bool> {
        validate_filename(filename)?;
        let path = self.data_dir.join(filename);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        if self.metadata.files.remove(filename).is_some() {
            self.save()?;
        }
        log::info!("Deleted {}", filename);
        Ok(true)
    }

    /// Files in the data directory, each with its upload record if one exists
    pub fn list(&self) -> Vec<FileEntry> {
        WalkDir::new(&self.data_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let filename = e.file_name().to_string_lossy().to_string();
                if !is_document_name(&filename) {
                    return None;
                }
                let size = e.metadata().map(|m| m.len()).unwrap_or(0);
                Some(FileEntry {
                    metadata: self.metadata.files.get(&filename).cloned(),
                    filename,
                    size,
                })
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.list().len()
    }

    pub fn record(&self, filename: &str) -> Option<&FileRecord> {
        self.metadata.files.get(filename)
    }

    fn save(&mut self) -> Result<()> {
        self.metadata.stats.total_files = self.metadata.files.len();
        sidecar::save_atomic(&self.metadata_path, &self.metadata)
    }
}

/// Plain names only: no separators, no parent references
fn validate_filename(filename: &str) -> Result<()> {
    let bad = filename.trim().is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0');
    if bad {
        return Err(RagchatError::InvalidInput(format!("Invalid filename: {:?}", filename)));
    }
    Ok(())
}

// sidecars, temp files and backups share the data directory
fn is_document_name(filename: &str) -> bool {
    !filename.starts_with('.') && DOCUMENT_EXTENSIONS.contains(&file_extension(Path::new(filename)).as_str())
}
