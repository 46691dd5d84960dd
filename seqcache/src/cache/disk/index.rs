//! Size index of block files for disk budget enforcement.
//!
//! Tracks every block file under the cache root with its size and
//! modification time. Enforcement deletes the oldest files first, where
//! "oldest" is the last write or successful read.
//!
//! # Lifecycle
//!
//! - Built by walking the root with [`BlockIndex::populate_from_disk`]
//! - Kept in sync through `record`, `touch` and `remove`
//! - Rebuilt from scratch when enforcement runs dry while still over budget

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::cache::disk::path::is_block_file;

/// Size and recency of one block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Statistics from populating the index from disk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PopulateStats {
    pub files_indexed: u64,
    pub total_bytes: u64,
}

/// Result of an enforcement run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvictionResult {
    /// Files deleted
    pub files_deleted: usize,
    /// Bytes freed
    pub bytes_freed: u64,
    /// Index entries dropped because the file was already gone
    pub stale_entries: usize,
    /// Total size when the run finished
    pub size_after: u64,
}

/// Thread-safe index of block files.
#[derive(Debug, Default)]
pub struct BlockIndex {
    files: DashMap<PathBuf, FileRecord>,
    total_size: AtomicU64,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file or update its size and modification time.
    pub fn record(&self, path: &Path, size_bytes: u64, modified: SystemTime) {
        let record = FileRecord {
            size_bytes,
            modified,
        };
        match self.files.insert(path.to_path_buf(), record) {
            Some(old) => {
                if size_bytes >= old.size_bytes {
                    self.total_size
                        .fetch_add(size_bytes - old.size_bytes, Ordering::Relaxed);
                } else {
                    self.total_size
                        .fetch_sub(old.size_bytes - size_bytes, Ordering::Relaxed);
                }
            }
            None => {
                self.total_size.fetch_add(size_bytes, Ordering::Relaxed);
            }
        }
    }

    /// Mark a file as just used.
    pub fn touch(&self, path: &Path) {
        if let Some(mut record) = self.files.get_mut(path) {
            record.modified = SystemTime::now();
        }
    }

    pub fn remove(&self, path: &Path) -> Option<FileRecord> {
        let (_, record) = self.files.remove(path)?;
        self.total_size
            .fetch_sub(record.size_bytes, Ordering::Relaxed);
        Some(record)
    }

    /// Drop every file below `dir`.
    pub fn remove_under(&self, dir: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|entry| entry.key().starts_with(dir))
            .map(|entry| entry.key().clone())
            .collect();
        for path in &doomed {
            self.remove(path);
        }
        doomed.len()
    }

    pub fn get(&self, path: &Path) -> Option<FileRecord> {
        self.files.get(path).map(|r| *r)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// File with the oldest modification time.
    pub fn oldest(&self) -> Option<(PathBuf, FileRecord)> {
        self.files
            .iter()
            .min_by_key(|entry| entry.value().modified)
            .map(|entry| (entry.key().clone(), *entry.value()))
    }

    pub fn clear(&self) {
        self.files.clear();
        self.total_size.store(0, Ordering::Relaxed);
    }

    /// Replace the index with the block files found under `root`.
    pub fn populate_from_disk(&self, root: &Path) -> io::Result<PopulateStats> {
        self.clear();
        let mut stats = PopulateStats::default();
        if !root.exists() {
            return Ok(stats);
        }

        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable cache directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if metadata.is_dir() {
                    pending.push(path);
                } else if metadata.is_file() && is_block_file(&path) {
                    let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
                    self.record(&path, metadata.len(), modified);
                    stats.files_indexed += 1;
                    stats.total_bytes += metadata.len();
                }
            }
        }

        debug!(
            root = %root.display(),
            files = stats.files_indexed,
            total_mb = stats.total_bytes / 1_000_000,
            "Block index populated from disk"
        );
        Ok(stats)
    }

    /// Delete oldest files until the total fits `limit`.
    ///
    /// Files already deleted by someone else are dropped from the index. If
    /// the index runs empty while still over the limit, `root` is rescanned
    /// once before giving up.
    pub fn evict_to_limit(&self, root: &Path, limit: u64) -> EvictionResult {
        let mut result = EvictionResult::default();
        let mut rescanned = false;

        while self.total_size() > limit {
            let Some((path, record)) = self.oldest() else {
                if rescanned {
                    break;
                }
                rescanned = true;
                if let Err(e) = self.populate_from_disk(root) {
                    debug!(root = %root.display(), error = %e, "Cache rescan failed");
                    break;
                }
                continue;
            };

            self.remove(&path);
            match fs::remove_file(&path) {
                Ok(()) => {
                    result.files_deleted += 1;
                    result.bytes_freed += record.size_bytes;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    result.stale_entries += 1;
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to delete cache file");
                }
            }
        }

        result.size_after = self.total_size();
        if result.files_deleted > 0 {
            info!(
                files_deleted = result.files_deleted,
                bytes_freed = result.bytes_freed,
                size_after = result.size_after,
                limit,
                "Disk cache eviction complete"
            );
        }
        result
    }
}
