//! Configuration types for the frame cache.
//!
//! These are the programmatic settings; the INI file layer in
//! [`crate::config`] maps onto them through `ConfigFile::to_cache_config`.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

use crate::cache::types::{CacheError, PassType, PassTypeSet, SceneId};

/// Default memory budget: 4 GiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 4 * 1024 * 1024 * 1024;

/// Default disk budget: 100 GiB.
pub const DEFAULT_DISK_BUDGET: u64 = 100 * 1024 * 1024 * 1024;

/// Default number of thumbnails kept in memory.
pub const DEFAULT_THUMBNAIL_LIMIT: usize = 5000;

/// Pass types persisted when nothing else is configured.
pub const DEFAULT_STORED_TYPES: PassTypeSet = PassTypeSet::from_bits(
    PassType::Raw.bit() | PassType::FinalOut.bit(),
);

/// Payload compression for disk block files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store raw bytes
    #[default]
    None,
    /// Fast compression
    Low,
    /// Small files, slower writes
    High,
}

impl Compression {
    /// Deflate level, or `None` when payloads are stored raw.
    pub fn level(self) -> Option<u32> {
        match self {
            Compression::None => None,
            Compression::Low => Some(1),
            Compression::High => Some(9),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Low => "low",
            Compression::High => "high",
        }
    }

    /// Parse a configuration value (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "none" | "off" | "0" => Some(Compression::None),
            "low" | "fast" => Some(Compression::Low),
            "high" | "best" => Some(Compression::High),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory tier configuration.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Budget in bytes (default: 4 GiB)
    pub max_size_bytes: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_BUDGET,
        }
    }
}

/// Disk tier configuration.
#[derive(Debug, Clone, Default)]
pub struct DiskStoreConfig {
    /// Cache root; `None` disables the disk tier
    pub root: Option<PathBuf>,
    /// Budget in bytes across the whole root (default: 100 GiB)
    pub max_size_bytes: u64,
    pub compression: Compression,
}

impl DiskStoreConfig {
    /// Whether the disk tier should be used.
    pub fn is_enabled(&self) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| !root.as_os_str().is_empty())
    }
}

/// Complete cache configuration for one scene.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub memory: MemoryStoreConfig,
    pub disk: DiskStoreConfig,
    /// Maximum number of thumbnails (default: 5000)
    pub thumbnail_limit: usize,
    /// Pass types kept as chain members and persisted to disk
    pub stored_types: PassTypeSet,
    /// Whether the background prefetch job is consulted
    pub prefetch_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryStoreConfig::default(),
            disk: DiskStoreConfig {
                root: None,
                max_size_bytes: DEFAULT_DISK_BUDGET,
                compression: Compression::None,
            },
            thumbnail_limit: DEFAULT_THUMBNAIL_LIMIT,
            stored_types: DEFAULT_STORED_TYPES,
            prefetch_enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set memory budget in bytes.
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory.max_size_bytes = size;
        self
    }

    /// Enable the disk tier under `root`.
    pub fn with_disk_root(mut self, root: PathBuf) -> Self {
        self.disk.root = Some(root);
        self
    }

    /// Set disk budget in bytes.
    pub fn with_disk_size(mut self, size: u64) -> Self {
        self.disk.max_size_bytes = size;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.disk.compression = compression;
        self
    }

    pub fn with_thumbnail_limit(mut self, limit: usize) -> Self {
        self.thumbnail_limit = limit;
        self
    }

    pub fn with_stored_types(mut self, types: PassTypeSet) -> Self {
        self.stored_types = types;
        self
    }

    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch_enabled = enabled;
        self
    }

    /// Reject settings the cache cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.memory.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "memory budget must be greater than zero".to_string(),
            ));
        }
        if self.disk.is_enabled() && self.disk.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "disk budget must be greater than zero when the disk cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Names the on-disk location of one scene's cache.
///
/// The session timestamp separates caches of scenes that share a name but
/// were created independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescriptor {
    pub id: SceneId,
    /// Project (file) name without extension
    pub project_name: String,
    pub scene_name: String,
    /// Seconds since the Unix epoch when the scene's cache session started
    pub session_timestamp: i64,
}

impl SceneDescriptor {
    /// Descriptor with a session timestamp of now.
    pub fn new(id: SceneId, project_name: impl Into<String>, scene_name: impl Into<String>) -> Self {
        Self {
            id,
            project_name: project_name.into(),
            scene_name: scene_name.into(),
            session_timestamp: Utc::now().timestamp(),
        }
    }

    /// Reuse an existing session, e.g. one recorded in a saved project.
    pub fn with_session_timestamp(mut self, timestamp: i64) -> Self {
        self.session_timestamp = timestamp;
        self
    }
}
