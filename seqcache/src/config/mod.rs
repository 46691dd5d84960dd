//! Configuration file support.
//!
//! The INI file at `~/.seqcache/config.ini` is parsed into a [`ConfigFile`]
//! and mapped onto the cache's programmatic [`crate::cache::CacheConfig`].
//!
//! # Example
//!
//! ```
//! use seqcache::config::ConfigFile;
//!
//! let file = ConfigFile::default();
//! let config = file.to_cache_config();
//! assert!(!config.disk.is_enabled());
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    suggested_disk_directory, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_DISK_SIZE,
    DEFAULT_LOG_FILE_NAME, DEFAULT_MEMORY_SIZE, DEFAULT_THUMBNAIL_LIMIT,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, DiskSettings, LoggingSettings, MemorySettings, StoreSettings, ThumbnailSettings,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
