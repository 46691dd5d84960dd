//! On-disk format versioning.
//!
//! Each project directory carries a `cache_version` file. A directory whose
//! version differs from [`DISK_CACHE_VERSION`] (or has none) is deleted and
//! recreated, since its block headers may not decode.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

/// Version of the block file layout written by this build.
pub const DISK_CACHE_VERSION: u32 = 2;

/// Name of the version sentinel inside a project directory.
pub const VERSION_FILE: &str = "cache_version";

/// Version recorded in `project_dir`, if any.
pub fn read_version(project_dir: &Path) -> Option<u32> {
    let text = fs::read_to_string(project_dir.join(VERSION_FILE)).ok()?;
    text.trim().parse().ok()
}

/// Make sure `project_dir` holds a cache of the current version.
///
/// Returns `true` when an existing directory was purged.
pub fn ensure_version(project_dir: &Path) -> io::Result<bool> {
    let found = read_version(project_dir);
    if found == Some(DISK_CACHE_VERSION) {
        return Ok(false);
    }

    let purged = project_dir.exists();
    if purged {
        info!(
            dir = %project_dir.display(),
            found = ?found,
            expected = DISK_CACHE_VERSION,
            "Disk cache version mismatch, purging"
        );
        fs::remove_dir_all(project_dir)?;
    }

    fs::create_dir_all(project_dir)?;
    fs::write(project_dir.join(VERSION_FILE), DISK_CACHE_VERSION.to_string())?;
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_directory_gets_version() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("proj_cache");

        assert!(!ensure_version(&dir).unwrap());
        assert_eq!(read_version(&dir), Some(DISK_CACHE_VERSION));
    }

    #[test]
    fn test_current_version_is_kept() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("proj_cache");
        ensure_version(&dir).unwrap();
        fs::write(dir.join("keep.cache"), b"x").unwrap();

        assert!(!ensure_version(&dir).unwrap());
        assert!(dir.join("keep.cache").exists());
    }

    #[test]
    fn test_mismatch_purges() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("proj_cache");
        fs::create_dir_all(dir.join("Scene-1")).unwrap();
        fs::write(dir.join(VERSION_FILE), "1").unwrap();
        fs::write(dir.join("Scene-1").join("old.cache"), b"x").unwrap();

        assert!(ensure_version(&dir).unwrap());
        assert!(!dir.join("Scene-1").exists());
        assert_eq!(read_version(&dir), Some(DISK_CACHE_VERSION));
    }

    #[test]
    fn test_missing_version_file_purges() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("proj_cache");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stray"), b"x").unwrap();

        assert!(ensure_version(&dir).unwrap());
        assert!(!dir.join("stray").exists());
    }
}
