//! Freshness bookkeeping for incremental indexing.
//!
//! The index state sidecar remembers, per file, the content hash it was
//! indexed with and when. A file needs reprocessing when it has no entry,
//! when its hash changed, or when the entry is older than `max_age_days`.

use crate::error::Result;
use crate::ingest::FileFingerprint;
use crate::sidecar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub hash: String,
    pub last_indexed: DateTime<Utc>,
    pub chunks_count: usize,
    pub size: u64,
}

/// On-disk layout of the index state sidecar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    #[serde(default)]
    pub indexed_files: BTreeMap<String, IndexEntry>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_chunks: usize,
}

impl IndexState {
    fn recount(&mut self) {
        self.total_chunks = self.indexed_files.values().map(|e| e.chunks_count).sum();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_indexed_files: usize,
    pub total_chunks: usize,
    pub last_update: Option<DateTime<Utc>>,
}

pub struct IncrementalIndexer {
    path: PathBuf,
    max_age_days: i64,
    state: IndexState,
}

impl IncrementalIndexer {
    /// Load the state at `path`; a missing or corrupt file starts empty
    pub fn open(path: &Path, max_age_days: i64) -> Self {
        let mut state: IndexState = sidecar::load_or_default(path);
        // the stored counter is display-only; entries are authoritative
        state.recount();
        log::debug!(
            "Index state {}: {} files, {} chunks",
            path.display(),
            state.indexed_files.len(),
            state.total_chunks
        );
        Self {
            path: path.to_path_buf(),
            max_age_days,
            state,
        }
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    pub fn entry(&self, filename: &str) -> Option<&IndexEntry> {
        self.state.indexed_files.get(filename)
    }

    pub fn indexed_filenames(&self) -> Vec<String> {
        self.state.indexed_files.keys().cloned().collect()
    }

    /// Stale when unindexed, changed, or older than `max_age_days` whole days at `now`
    pub fn needs_reindexing(&self, filename: &str, file: &FileFingerprint, now: DateTime<Utc>) -> bool {
        match self.state.indexed_files.get(filename) {
            None => true,
            Some(entry) if entry.hash != file.content_hash => true,
            Some(entry) => (now - entry.last_indexed).num_days() > self.max_age_days,
        }
    }

    /// Subset of `current_files` that needs (re)indexing now
    pub fn get_files_to_index(&self, current_files: &[FileFingerprint]) -> Vec<FileFingerprint> {
        let now = Utc::now();
        current_files
            .iter()
            .filter(|f| self.needs_reindexing(&f.filename, f, now))
            .cloned()
            .collect()
    }

    pub fn mark_files_as_indexed(&mut self, files: &[FileFingerprint], chunks_count: usize) -> Result<()> {
        self.mark_files_as_indexed_at(files, chunks_count, Utc::now())
    }

    /// Record `files` as indexed at `now`, each with `chunks_count` chunks
    pub fn mark_files_as_indexed_at(
        &mut self,
        files: &[FileFingerprint],
        chunks_count: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for file in files {
            self.state.indexed_files.insert(
                file.filename.clone(),
                IndexEntry {
                    hash: file.content_hash.clone(),
                    last_indexed: now,
                    chunks_count,
                    size: file.size,
                },
            );
        }
        self.state.last_update = Some(now);
        self.state.recount();
        self.save()
    }

    /// Drop a file's entry. Returns false when it had none.
    pub fn remove_file_from_index(&mut self, filename: &str) -> Result<bool> {
        if self.state.indexed_files.remove(filename).is_none() {
            return Ok(false);
        }
        self.state.recount();
        self.save()?;
        Ok(true)
    }

    pub fn get_index_stats(&self) -> IndexStats {
        IndexStats {
            total_indexed_files: self.state.indexed_files.len(),
            total_chunks: self.state.total_chunks,
            last_update: self.state.last_update,
        }
    }

    fn save(&self) -> Result<()> {
        sidecar::save_atomic(&self.path, &self.state)
    }
}
