//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init` for locating,
//! viewing and creating the configuration file.

use std::path::Path;

use clap::Subcommand;
use seqcache::config::{format_size, suggested_disk_directory, ConfigFile};

use crate::commands::common::{load_config, resolve_config_path};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration as INI
    Show,

    /// Write a default configuration file if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, override_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(override_path),
        ConfigCommands::Show => run_show(override_path),
        ConfigCommands::Init => run_init(override_path),
    }
}

/// Show the configuration file path.
fn run_path(override_path: Option<&Path>) -> Result<(), CliError> {
    println!("{}", resolve_config_path(override_path).display());
    Ok(())
}

fn run_show(override_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(override_path)?;
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_init(override_path: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_config_path(override_path);
    if path.exists() {
        println!("Configuration already exists: {}", path.display());
        return Ok(());
    }

    let config = ConfigFile::default();
    config.save_to(&path)?;
    println!("Created {}", path.display());
    println!("  Memory budget: {}", format_size(config.memory.budget));
    println!("  Disk cache:    disabled");
    println!();
    println!("To enable the disk cache, add to the [disk] section:");
    println!("  directory = {}", suggested_disk_directory().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_loadable_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        run_init(Some(&path)).unwrap();

        assert!(path.exists());
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.memory.budget, ConfigFile::default().memory.budget);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[thumbnails]\nlimit = 7\n").unwrap();

        run_init(Some(&path)).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap().thumbnails.limit, 7);
    }
}
