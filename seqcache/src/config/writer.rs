//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let directory = config
        .disk
        .directory
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let types = config
        .store
        .types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"[memory]
; In-memory frame budget (default: 4GB)
; Supports: KB, MB, GB, TB suffixes (e.g., 512MB, 4GB, 16GB)
budget = {}

[disk]
; Root directory of the on-disk frame cache. Leave empty to disable it.
; Example: directory = ~/.cache/seqcache
directory = {}
; Disk budget shared by all projects under the directory (default: 100GB)
size = {}
; Payload compression: none, low (fast) or high (smaller files)
compression = {}

[thumbnails]
; Thumbnails kept before off-screen ones are dropped (default: 5000)
limit = {}

[store]
; Pass types kept as permanent entries and written to disk.
; Comma list of: raw, preprocessed, composite, final_out, thumbnail
types = {}
; Keep frames of a running prefetch job from being recycled
prefetch = {}

[logging]
; Log file path
file = {}
"#,
        format_size(config.memory.budget),
        directory,
        format_size(config.disk.size),
        config.disk.compression,
        config.thumbnails.limit,
        types,
        config.store.prefetch,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
