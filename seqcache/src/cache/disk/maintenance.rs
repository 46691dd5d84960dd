//! Offline maintenance of a disk cache root.
//!
//! These helpers work on a root directory without opening a scene, for use
//! by tooling while no editor session is writing to the cache.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cache::disk::format::{is_compressed, BlockHeader, DiskFormatError, HeaderSlot};
use crate::cache::disk::index::{BlockIndex, EvictionResult, PopulateStats};
use crate::cache::disk::path::BlockFileName;
use crate::cache::disk::version::{read_version, VERSION_FILE};

/// Outcome of [`clear_disk_cache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Project directories removed
    pub projects_removed: usize,
    /// Block files inside them
    pub files_deleted: u64,
    pub bytes_freed: u64,
}

/// One populated slot of an inspected block file.
#[derive(Debug, Clone)]
pub struct SlotReport {
    pub index: usize,
    pub slot: HeaderSlot,
    /// Payload starts with a gzip header
    pub compressed: bool,
}

/// Contents of a block file.
#[derive(Debug, Clone)]
pub struct BlockReport {
    pub path: PathBuf,
    /// Parsed file name, if it follows the block naming scheme
    pub name: Option<BlockFileName>,
    pub file_size: u64,
    pub slots: Vec<SlotReport>,
}

impl BlockReport {
    /// Sum of raw payload sizes.
    pub fn raw_bytes(&self) -> u64 {
        self.slots.iter().map(|s| s.slot.raw_size).sum()
    }

    /// Sum of stored payload sizes.
    pub fn stored_bytes(&self) -> u64 {
        self.slots.iter().map(|s| s.slot.compressed_size).sum()
    }
}

/// Count block files and bytes under `root`.
pub fn disk_usage(root: &Path) -> io::Result<PopulateStats> {
    BlockIndex::new().populate_from_disk(root)
}

/// Delete least recently used block files until `root` fits `limit`.
pub fn collect_garbage(root: &Path, limit: u64) -> io::Result<EvictionResult> {
    let index = BlockIndex::new();
    index.populate_from_disk(root)?;
    let result = index.evict_to_limit(root, limit);
    info!(
        root = %root.display(),
        files_deleted = result.files_deleted,
        bytes_freed = result.bytes_freed,
        "Disk cache garbage collection complete"
    );
    Ok(result)
}

/// Remove every project cache directory under `root`.
///
/// Only directories carrying a version file are touched, so unrelated
/// content sharing the root survives.
pub fn clear_disk_cache(root: &Path) -> io::Result<ClearResult> {
    let mut result = ClearResult::default();
    if !root.exists() {
        return Ok(result);
    }

    for entry in fs::read_dir(root)?.flatten() {
        let path = entry.path();
        if !path.is_dir() || !path.join(VERSION_FILE).exists() {
            continue;
        }

        let usage = disk_usage(&path)?;
        debug!(
            dir = %path.display(),
            version = ?read_version(&path),
            files = usage.files_indexed,
            "Removing project cache"
        );
        fs::remove_dir_all(&path)?;
        result.projects_removed += 1;
        result.files_deleted += usage.files_indexed;
        result.bytes_freed += usage.total_bytes;
    }
    Ok(result)
}

/// Read the directory of a block file.
pub fn inspect_block(path: &Path) -> Result<BlockReport, DiskFormatError> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let header = BlockHeader::read_from(&mut file)?;

    let mut slots = Vec::new();
    for (index, slot) in header.slots().iter().enumerate() {
        if slot.is_empty() {
            continue;
        }
        let compressed = payload_prefix(&mut file, slot)
            .map(|prefix| is_compressed(&prefix))
            .unwrap_or(false);
        slots.push(SlotReport {
            index,
            slot: slot.clone(),
            compressed,
        });
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(BlockFileName::parse);

    Ok(BlockReport {
        path: path.to_path_buf(),
        name,
        file_size,
        slots,
    })
}

fn payload_prefix(file: &mut File, slot: &HeaderSlot) -> io::Result<Vec<u8>> {
    let mut prefix = vec![0u8; slot.compressed_size.min(4) as usize];
    file.seek(SeekFrom::Start(slot.offset))?;
    file.read_exact(&mut prefix)?;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::Compression;
    use crate::cache::disk::format::{append_entry, HEADER_SIZE};
    use crate::cache::disk::version::ensure_version;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    const BLOCK: &str = "8-4x4-100%(0)-0.cache";

    fn write_block(dir: &Path, frames: &[i64], compression: Compression) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(BLOCK);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        for &frame in frames {
            append_entry(&mut file, frame, &[7u8; 64], "sRGB", compression).unwrap();
        }
        path
    }

    #[test]
    fn test_inspect_lists_populated_slots() {
        let temp = TempDir::new().unwrap();
        let path = write_block(temp.path(), &[3, 4, 9], Compression::High);

        let report = inspect_block(&path).unwrap();

        assert_eq!(report.slots.len(), 3);
        assert_eq!(report.slots[2].slot.frame, 9);
        assert!(report.slots.iter().all(|s| s.compressed));
        assert_eq!(report.raw_bytes(), 3 * 64);
        assert!(report.stored_bytes() < report.raw_bytes());
        assert_eq!(report.name.unwrap().block, 0);
    }

    #[test]
    fn test_inspect_uncompressed() {
        let temp = TempDir::new().unwrap();
        let path = write_block(temp.path(), &[1], Compression::None);

        let report = inspect_block(&path).unwrap();

        assert!(!report.slots[0].compressed);
        assert_eq!(report.file_size, (HEADER_SIZE + 64) as u64);
    }

    #[test]
    fn test_inspect_rejects_short_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(BLOCK);
        fs::write(&path, b"short").unwrap();

        assert!(inspect_block(&path).is_err());
    }

    #[test]
    fn test_clear_only_removes_project_caches() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("film_cache");
        ensure_version(&project).unwrap();
        write_block(&project.join("Scene-1").join("clip"), &[1, 2], Compression::None);

        let unrelated = temp.path().join("notes");
        fs::create_dir_all(&unrelated).unwrap();

        let result = clear_disk_cache(temp.path()).unwrap();

        assert_eq!(result.projects_removed, 1);
        assert_eq!(result.files_deleted, 1);
        assert!(result.bytes_freed > 0);
        assert!(!project.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_usage_and_garbage_collection() {
        let temp = TempDir::new().unwrap();
        for clip in ["a", "b", "c"] {
            write_block(&temp.path().join("film_cache").join(clip), &[0], Compression::None);
        }

        let usage = disk_usage(temp.path()).unwrap();
        assert_eq!(usage.files_indexed, 3);

        let limit = usage.total_bytes / 3 + 1;
        let result = collect_garbage(temp.path(), limit).unwrap();
        assert_eq!(result.files_deleted, 2);
        assert_eq!(disk_usage(temp.path()).unwrap().files_indexed, 1);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        assert_eq!(disk_usage(&missing).unwrap().files_indexed, 0);
        assert_eq!(clear_disk_cache(&missing).unwrap(), ClearResult::default());
    }
}
