//! Disk cache management CLI commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use seqcache::cache::disk::{
    clear_disk_cache, collect_garbage, disk_usage, inspect_block, BlockReport,
};
use seqcache::config::{format_size, parse_size, ConfigFile};
use tracing::info;

use crate::commands::common::{disk_root, start_logging};
use crate::error::CliError;

/// Disk action subcommands.
#[derive(Debug, Subcommand)]
pub enum DiskAction {
    /// Show disk cache statistics
    Stats,

    /// List the frames stored in one block file
    Inspect {
        /// Path to a `.cache` block file
        file: PathBuf,
    },

    /// Delete least recently used block files until the cache fits its budget
    Gc {
        /// Budget to enforce instead of the configured one (e.g. 20GB)
        #[arg(long)]
        limit: Option<String>,
    },

    /// Clear the disk cache, removing every project cache under the root
    Clear,
}

/// Run a disk subcommand.
pub fn run(action: DiskAction, config: &ConfigFile) -> Result<(), CliError> {
    match action {
        DiskAction::Stats => run_stats(config),
        DiskAction::Inspect { file } => run_inspect(&file),
        DiskAction::Gc { limit } => run_gc(config, limit.as_deref()),
        DiskAction::Clear => run_clear(config),
    }
}

fn run_stats(config: &ConfigFile) -> Result<(), CliError> {
    let root = disk_root(config)?;
    let usage = disk_usage(&root).map_err(|error| CliError::Disk {
        action: "scan",
        error,
    })?;

    println!("Disk cache: {}", root.display());
    println!("  Files:  {}", usage.files_indexed);
    println!("  Size:   {}", format_size(usage.total_bytes as usize));
    println!("  Budget: {}", format_size(config.disk.size));
    println!("  Compression: {}", config.disk.compression);
    Ok(())
}

fn run_inspect(file: &Path) -> Result<(), CliError> {
    let report = inspect_block(file).map_err(|error| CliError::Inspect {
        path: file.to_path_buf(),
        error,
    })?;
    print!("{}", format_report(&report));
    Ok(())
}

fn run_gc(config: &ConfigFile, limit: Option<&str>) -> Result<(), CliError> {
    let root = disk_root(config)?;
    let limit = match limit {
        Some(value) => parse_size(value).map_err(|e| CliError::Config(e.to_string()))?,
        None => config.disk.size,
    };
    let _guard = start_logging(config)?;

    info!(root = %root.display(), limit = %format_size(limit), "Collecting disk cache garbage");
    let result = collect_garbage(&root, limit as u64).map_err(|error| CliError::Disk {
        action: "collect",
        error,
    })?;

    println!(
        "Deleted {} files, freed {}",
        result.files_deleted,
        format_size(result.bytes_freed as usize)
    );
    println!("Cache size now {}", format_size(result.size_after as usize));
    Ok(())
}

fn run_clear(config: &ConfigFile) -> Result<(), CliError> {
    let root = disk_root(config)?;
    let _guard = start_logging(config)?;

    println!("Clearing disk cache at: {}", root.display());
    let result = clear_disk_cache(&root).map_err(|error| CliError::Disk {
        action: "clear",
        error,
    })?;

    println!(
        "Removed {} project caches: {} files, freed {}",
        result.projects_removed,
        result.files_deleted,
        format_size(result.bytes_freed as usize)
    );
    Ok(())
}

/// Human-readable listing of a block file.
fn format_report(report: &BlockReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Block file: {}\n", report.path.display()));
    if let Some(name) = &report.name {
        out.push_str(&format!(
            "  Pass: {}  Size: {}x{}  Preview: {}%  View: {}\n",
            name.pass, name.width, name.height, name.preview_percent, name.view_id
        ));
        out.push_str(&format!(
            "  Frames: {}-{}\n",
            name.first_frame(),
            name.first_frame() + 99
        ));
    }
    out.push_str(&format!(
        "  File size: {}  Entries: {}  Raw: {}  Stored: {}\n",
        report.file_size,
        report.slots.len(),
        report.raw_bytes(),
        report.stored_bytes()
    ));

    if !report.slots.is_empty() {
        out.push('\n');
        out.push_str("  slot  frame     raw      stored   gzip  colorspace\n");
    }
    for entry in &report.slots {
        out.push_str(&format!(
            "  {:>4}  {:>5}  {:>8}  {:>8}  {:<4}  {}\n",
            entry.index,
            entry.slot.frame,
            entry.slot.raw_size,
            entry.slot.compressed_size,
            if entry.compressed { "yes" } else { "no" },
            entry.slot.colorspace
        ));
    }
    out
}
