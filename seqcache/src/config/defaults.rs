//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::cache;

/// Name of the configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".seqcache";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Name of the log file inside the configuration directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "seqcache.log";

/// Default memory budget (4GB).
pub const DEFAULT_MEMORY_SIZE: usize = cache::DEFAULT_MEMORY_BUDGET;

/// Default disk budget (100GB).
pub const DEFAULT_DISK_SIZE: usize = cache::DEFAULT_DISK_BUDGET as usize;

/// Default thumbnail limit.
pub const DEFAULT_THUMBNAIL_LIMIT: usize = cache::DEFAULT_THUMBNAIL_LIMIT;

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            memory: MemorySettings {
                budget: DEFAULT_MEMORY_SIZE,
            },
            disk: DiskSettings {
                directory: None,
                size: DEFAULT_DISK_SIZE,
                compression: cache::Compression::default(),
            },
            thumbnails: ThumbnailSettings {
                limit: DEFAULT_THUMBNAIL_LIMIT,
            },
            store: StoreSettings {
                types: cache::DEFAULT_STORED_TYPES,
                prefetch: true,
            },
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}

/// Platform cache directory suggested for the disk tier.
///
/// Not used unless written into the config file; the disk tier is off by
/// default.
pub fn suggested_disk_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seqcache")
}
