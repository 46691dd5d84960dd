//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::cache::{Compression, PassTypeSet};

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Memory store settings
    pub memory: MemorySettings,
    /// Disk tier settings
    pub disk: DiskSettings,
    /// Timeline thumbnail settings
    pub thumbnails: ThumbnailSettings,
    /// Which pass types are kept as permanent entries
    pub store: StoreSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[memory]` section.
#[derive(Debug, Clone)]
pub struct MemorySettings {
    /// Memory budget in bytes
    pub budget: usize,
}

/// `[disk]` section.
#[derive(Debug, Clone)]
pub struct DiskSettings {
    /// Cache root. `None` disables the disk tier.
    pub directory: Option<PathBuf>,
    /// Disk budget in bytes, shared by every project under the root
    pub size: usize,
    /// Payload compression for block files
    pub compression: Compression,
}

/// `[thumbnails]` section.
#[derive(Debug, Clone)]
pub struct ThumbnailSettings {
    /// Maximum thumbnails kept before off-screen ones are dropped
    pub limit: usize,
}

/// `[store]` section.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Pass types kept permanently and written to disk
    pub types: PassTypeSet,
    /// Protect frames of a running prefetch job from recycling
    pub prefetch: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
