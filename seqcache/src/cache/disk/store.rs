//! Persistent frame store for one scene.
//!
//! Block files are read and rewritten under a single I/O lock that is
//! separate from the memory store's lock, so slow disks never stall memory
//! lookups. Every public operation degrades to a miss or a no-op on I/O
//! failure.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::buffer::{FrameBuffer, PixelFormat};
use crate::cache::config::{Compression, DiskStoreConfig, SceneDescriptor};
use crate::cache::disk::format::{self, DiskFormatError};
use crate::cache::disk::index::{BlockIndex, EvictionResult};
use crate::cache::disk::path::{
    block_path, disk_frame, project_directory, scene_directory, strip_directory, BlockFileName,
};
use crate::cache::disk::version::ensure_version;
use crate::cache::disk::SLOTS_PER_FILE;
use crate::cache::timeline::{FrameRange, StripInfo};
use crate::cache::types::{CacheError, CacheKey, PassTypeSet};

/// Block-file store rooted at the configured cache directory.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    scene: SceneDescriptor,
    max_size_bytes: u64,
    compression: Compression,
    index: BlockIndex,
    io_lock: Mutex<()>,
}

impl DiskStore {
    /// Open the store, purging an outdated project directory.
    ///
    /// The size index covers every project under the root since they share
    /// one budget.
    pub fn open(config: &DiskStoreConfig, scene: SceneDescriptor) -> Result<Self, CacheError> {
        let root = match &config.root {
            Some(root) if !root.as_os_str().is_empty() => root.clone(),
            _ => {
                return Err(CacheError::InvalidConfig(
                    "disk cache root is not set".to_string(),
                ))
            }
        };

        fs::create_dir_all(&root)?;
        let project_dir = project_directory(&root, &scene.project_name);
        ensure_version(&project_dir)?;

        let index = BlockIndex::new();
        let stats = index.populate_from_disk(&root)?;

        info!(
            root = %root.display(),
            scene = %scene.scene_name,
            files = stats.files_indexed,
            size_bytes = stats.total_bytes,
            limit_bytes = config.max_size_bytes,
            compression = %config.compression,
            "Disk cache enabled"
        );

        let store = Self {
            root,
            scene,
            max_size_bytes: config.max_size_bytes,
            compression: config.compression,
            index,
            io_lock: Mutex::new(()),
        };
        store.enforce_limit();
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scene(&self) -> &SceneDescriptor {
        &self.scene
    }

    pub fn project_dir(&self) -> PathBuf {
        project_directory(&self.root, &self.scene.project_name)
    }

    pub fn scene_dir(&self) -> PathBuf {
        scene_directory(&self.root, &self.scene)
    }

    pub fn strip_dir(&self, strip_name: &str) -> PathBuf {
        strip_directory(&self.root, &self.scene, strip_name)
    }

    /// Path of the block file that holds `key`.
    pub fn path_for(&self, key: &CacheKey, strip_name: &str) -> PathBuf {
        block_path(&self.root, &self.scene, strip_name, key)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Bytes of all indexed block files under the root.
    pub fn total_size(&self) -> u64 {
        self.index.total_size()
    }

    pub fn file_count(&self) -> usize {
        self.index.file_count()
    }

    /// Persist a buffer. Returns whether it was written.
    ///
    /// Buffers whose dimensions differ from the key's render context are
    /// not persisted; block files store no dimensions of their own.
    pub fn write(&self, key: &CacheKey, buffer: &FrameBuffer, strip_name: &str) -> bool {
        match self.try_write(key, buffer, strip_name) {
            Ok(written) => written,
            Err(e) => {
                debug!(strip = strip_name, frame = key.frame_index, error = %e, "Disk cache write failed");
                false
            }
        }
    }

    fn try_write(&self, key: &CacheKey, buffer: &FrameBuffer, strip_name: &str) -> Result<bool, CacheError> {
        if buffer.is_empty()
            || buffer.width() != key.context.width
            || buffer.height() != key.context.height
        {
            return Ok(false);
        }

        let path = self.path_for(key, strip_name);
        let frame = disk_frame(key.frame_index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let _guard = self.io_lock.lock();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() > 0 {
            match format::BlockHeader::read_from(&mut file) {
                Ok(header) if header.find(frame).is_some() => return Ok(true),
                Ok(_) => {}
                Err(e) => {
                    self.discard_corrupt(file, &path, &e);
                    return Ok(false);
                }
            }
        }

        match format::append_entry(&mut file, frame, buffer.pixels(), buffer.colorspace(), self.compression) {
            Ok(outcome) => {
                if outcome.wrapped {
                    debug!(path = %path.display(), "Block file full, wrapped to slot 0");
                }
            }
            Err(DiskFormatError::Io(e)) => return Err(e.into()),
            Err(e) => {
                self.discard_corrupt(file, &path, &e);
                return Ok(false);
            }
        }

        let size = file.metadata()?.len();
        self.index.record(&path, size, SystemTime::now());
        Ok(true)
    }

    fn discard_corrupt(&self, file: File, path: &Path, error: &DiskFormatError) {
        drop(file);
        debug!(path = %path.display(), error = %error, "Deleting block file with corrupt header");
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "Failed to delete corrupt block file");
        }
        self.index.remove(path);
    }

    /// Load a buffer for `key`, touching the block file on a hit.
    pub fn read(&self, key: &CacheKey, strip_name: &str) -> Option<FrameBuffer> {
        let path = self.path_for(key, strip_name);
        let frame = disk_frame(key.frame_index);

        let _guard = self.io_lock.lock();
        let mut file = File::open(&path).ok()?;

        let (slot, pixels) = match format::read_entry(&mut file, frame) {
            Ok(found) => found?,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable block file header");
                return None;
            }
        };
        drop(file);

        let (width, height) = (key.context.width, key.context.height);
        let Some(pixel_format) = PixelFormat::from_image_size(width, height, pixels.len()) else {
            debug!(path = %path.display(), frame, "Disk entry does not match render size");
            return None;
        };
        let buffer = FrameBuffer::new(width, height, pixel_format, slot.colorspace, pixels).ok()?;

        self.touch(&path);
        Some(buffer)
    }

    fn touch(&self, path: &Path) {
        let now = SystemTime::now();
        if let Err(e) = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|f| f.set_modified(now))
        {
            debug!(path = %path.display(), error = %e, "Failed to touch block file");
        }
        self.index.touch(path);
    }

    /// Delete oldest block files until the root fits its budget.
    pub fn enforce_limit(&self) -> EvictionResult {
        let _guard = self.io_lock.lock();
        self.index.evict_to_limit(&self.root, self.max_size_bytes)
    }

    /// Delete a strip's block files of the given types overlapping `range`.
    ///
    /// A block covers 100 frame indices; its timeline position is taken
    /// relative to the strip's content start.
    pub fn invalidate(&self, strip: &StripInfo, range: FrameRange, types: PassTypeSet) -> usize {
        let dir = self.strip_dir(&strip.name);
        let _guard = self.io_lock.lock();

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(BlockFileName::parse)
            else {
                continue;
            };
            if !types.contains(name.pass) {
                continue;
            }

            let start = name.first_frame() as f32 + strip.start;
            let end = start + SLOTS_PER_FILE as f32;
            if start > range.end || end < range.start {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "Failed to delete block file"),
            }
            self.index.remove(&path);
        }

        if removed > 0 {
            debug!(strip = %strip.name, removed, "Invalidated disk cache files");
        }
        removed
    }

    /// Delete this scene's cache session directory.
    pub fn clear_scene(&self) -> usize {
        let dir = self.scene_dir();
        let _guard = self.io_lock.lock();
        let removed = self.index.remove_under(&dir);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to remove scene disk cache");
            }
        }
        removed
    }
}
