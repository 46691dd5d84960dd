//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use seqcache::cache::disk::DiskFormatError;
use seqcache::config::{suggested_disk_directory, ConfigFileError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// No disk cache directory is configured
    DiskDisabled,
    /// A disk maintenance operation failed
    Disk { action: &'static str, error: io::Error },
    /// A block file could not be decoded
    Inspect { path: PathBuf, error: DiskFormatError },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::DiskDisabled = self {
            eprintln!();
            eprintln!("Set a cache directory in the [disk] section of the config file:");
            eprintln!("  [disk]");
            eprintln!("  directory = {}", suggested_disk_directory().display());
            eprintln!();
            eprintln!("Run 'seqcache config path' to locate the file.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::DiskDisabled => write!(f, "Disk cache is disabled"),
            CliError::Disk { action, error } => {
                write!(f, "Failed to {} disk cache: {}", action, error)
            }
            CliError::Inspect { path, error } => {
                write!(f, "Cannot read block file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Disk { error, .. } => Some(error),
            CliError::Inspect { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
