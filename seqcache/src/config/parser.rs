//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::cache::{Compression, PassType, PassTypeSet};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [memory] section
    if let Some(section) = ini.section(Some("memory")) {
        if let Some(v) = section.get("budget") {
            config.memory.budget = parse_size(v).map_err(|_| {
                invalid("memory", "budget", v, "expected format like '4GB', '500MB', or '1024KB'")
            })?;
            if config.memory.budget == 0 {
                return Err(invalid("memory", "budget", v, "must be greater than zero"));
            }
        }
    }

    // [disk] section
    if let Some(section) = ini.section(Some("disk")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.disk.directory = if v.is_empty() {
                None
            } else {
                Some(expand_tilde(v))
            };
        }
        if let Some(v) = section.get("size") {
            config.disk.size = parse_size(v).map_err(|_| {
                invalid("disk", "size", v, "expected format like '100GB', '500MB', or '1024KB'")
            })?;
        }
        if let Some(v) = section.get("compression") {
            config.disk.compression = Compression::from_name(v)
                .ok_or_else(|| invalid("disk", "compression", v, "must be one of: none, low, high"))?;
        }
    }

    // [thumbnails] section
    if let Some(section) = ini.section(Some("thumbnails")) {
        if let Some(v) = section.get("limit") {
            config.thumbnails.limit = v
                .trim()
                .parse()
                .map_err(|_| invalid("thumbnails", "limit", v, "must be a positive integer"))?;
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("types") {
            config.store.types = parse_pass_types(v).ok_or_else(|| {
                invalid(
                    "store",
                    "types",
                    v,
                    "expected a comma list of raw, preprocessed, composite, final_out, thumbnail or a bitmask",
                )
            })?;
        }
        if let Some(v) = section.get("prefetch") {
            config.store.prefetch = parse_bool(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a pass type list.
///
/// Accepts a comma-separated list of names or the external integer bitmask
/// (RAW=1, PREPROCESSED=2, COMPOSITE=4, FINAL_OUT=8, THUMBNAIL=16). An empty
/// value is the empty set.
pub(super) fn parse_pass_types(value: &str) -> Option<PassTypeSet> {
    let value = value.trim();
    if let Ok(bits) = value.parse::<u8>() {
        return (bits & !PassTypeSet::all().bits() == 0).then(|| PassTypeSet::from_bits(bits));
    }

    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(PassType::from_name)
        .collect::<Option<Vec<_>>>()
        .map(|types| types.into_iter().collect())
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::config::settings::ConfigFile;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_full_config() {
        let config = load(
            r#"
[memory]
budget = 2GB

[disk]
directory = /var/cache/frames
size = 50GB
compression = high

[thumbnails]
limit = 800

[store]
types = raw, composite, final_out
prefetch = false

[logging]
file = /tmp/seqcache.log
"#,
        )
        .unwrap();

        assert_eq!(config.memory.budget, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.disk.directory, Some(PathBuf::from("/var/cache/frames")));
        assert_eq!(config.disk.size, 50 * 1024 * 1024 * 1024);
        assert_eq!(config.disk.compression, Compression::High);
        assert_eq!(config.thumbnails.limit, 800);
        assert_eq!(
            config.store.types,
            PassType::Raw | PassType::Composite | PassType::FinalOut
        );
        assert!(!config.store.prefetch);
        assert_eq!(config.logging.file, PathBuf::from("/tmp/seqcache.log"));
    }

    #[test]
    fn test_partial_config() {
        let config = load(
            r#"
[thumbnails]
limit = 10
"#,
        )
        .unwrap();

        assert_eq!(config.thumbnails.limit, 10);
        assert_eq!(config.memory.budget, DEFAULT_MEMORY_SIZE);
        assert_eq!(config.disk.size, DEFAULT_DISK_SIZE);
        assert!(config.disk.directory.is_none());
    }

    #[test]
    fn test_empty_directory_disables_disk() {
        let config = load("[disk]\ndirectory =\n").unwrap();
        assert!(config.disk.directory.is_none());
    }

    #[test]
    fn test_invalid_memory_budget() {
        let err = load("[memory]\nbudget = 2PB\n").unwrap_err();
        assert!(err.to_string().contains("memory.budget"));

        let err = load("[memory]\nbudget = 0\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_invalid_compression() {
        let err = load("[disk]\ncompression = extreme\n").unwrap_err();
        assert!(err.to_string().contains("must be one of: none, low, high"));
    }

    #[test]
    fn test_invalid_thumbnail_limit() {
        let err = load("[thumbnails]\nlimit = lots\n").unwrap_err();
        assert!(err.to_string().contains("thumbnails.limit"));
    }

    #[test]
    fn test_parse_pass_types_names() {
        assert_eq!(
            parse_pass_types("raw,final_out"),
            Some(PassType::Raw | PassType::FinalOut)
        );
        assert_eq!(parse_pass_types(" Thumbnail "), Some(PassType::Thumbnail.into()));
        assert_eq!(parse_pass_types(""), Some(PassTypeSet::empty()));
        assert_eq!(parse_pass_types("raw,bogus"), None);
    }

    #[test]
    fn test_parse_pass_types_bitmask() {
        assert_eq!(parse_pass_types("9"), Some(PassType::Raw | PassType::FinalOut));
        assert_eq!(parse_pass_types("31"), Some(PassTypeSet::all()));
        assert_eq!(parse_pass_types("32"), None);
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/frames");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("frames"));
        }

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_parse_bool_values() {
        for v in ["true", "TRUE", "yes", "1", "on", " true "] {
            assert!(parse_bool(v), "{} should be true", v);
        }
        for v in ["false", "no", "0", "off", "", "maybe"] {
            assert!(!parse_bool(v), "{} should be false", v);
        }
    }
}
