//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use seqcache::config::{config_file_path, ConfigFile};
use seqcache::logging::{init_logging, split_log_path, LoggingGuard};

use crate::error::CliError;

/// Config file to use: the `--config` override or the default location.
pub fn resolve_config_path(override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(override_path: Option<&Path>) -> Result<ConfigFile, CliError> {
    Ok(ConfigFile::load_from(&resolve_config_path(override_path))?)
}

/// Configured disk cache root.
pub fn disk_root(config: &ConfigFile) -> Result<PathBuf, CliError> {
    config
        .disk
        .directory
        .clone()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or(CliError::DiskDisabled)
}

/// Start file and console logging at the configured log path.
pub fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    let (dir, file) = split_log_path(&config.logging.file);
    init_logging(&dir, &file).map_err(|e| CliError::LoggingInit(e.to_string()))
}
