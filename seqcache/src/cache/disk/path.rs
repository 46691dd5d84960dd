//! Disk cache path construction and block file names.
//!
//! ```text
//! <root>/<project>_cache/
//!     cache_version
//!     <scene>-<session timestamp>/
//!         <strip>/
//!             <pass>-<w>x<h>-<percent>%(<view>)-<block>.cache
//! ```

use std::path::{Path, PathBuf};

use crate::cache::config::SceneDescriptor;
use crate::cache::disk::format::SLOTS_PER_FILE;
use crate::cache::types::{CacheKey, PassType};

/// Extension of block files.
pub const BLOCK_EXTENSION: &str = "cache";

/// Make a name safe to use as one path component.
///
/// Separators, characters reserved on common filesystems and control
/// characters become `_`. Names that would be empty or refer to `.`/`..`
/// are replaced as well.
///
/// # Example
///
/// ```
/// use seqcache::cache::disk::sanitize_component;
///
/// assert_eq!(sanitize_component("Shot 1/2: final?"), "Shot 1_2_ final_");
/// assert_eq!(sanitize_component(".."), "_");
/// ```
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Directory holding every scene of one project.
pub fn project_directory(root: &Path, project_name: &str) -> PathBuf {
    root.join(format!("{}_cache", sanitize_component(project_name)))
}

/// Directory of one scene's cache session.
pub fn scene_directory(root: &Path, scene: &SceneDescriptor) -> PathBuf {
    project_directory(root, &scene.project_name).join(format!(
        "{}-{}",
        sanitize_component(&scene.scene_name),
        scene.session_timestamp
    ))
}

/// Directory of one strip's block files.
pub fn strip_directory(root: &Path, scene: &SceneDescriptor, strip_name: &str) -> PathBuf {
    scene_directory(root, scene).join(sanitize_component(strip_name))
}

/// Frame number stored in block file slots.
pub fn disk_frame(frame_index: f32) -> i64 {
    frame_index.floor() as i64
}

/// Index of the block file holding `frame_index`.
pub fn frame_block(frame_index: f32) -> i64 {
    disk_frame(frame_index).div_euclid(SLOTS_PER_FILE as i64)
}

/// Fields encoded in a block file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFileName {
    pub pass: PassType,
    pub width: u32,
    pub height: u32,
    pub preview_percent: u32,
    pub view_id: u32,
    pub block: i64,
}

impl BlockFileName {
    pub fn from_key(key: &CacheKey) -> Self {
        Self {
            pass: key.pass,
            width: key.context.width,
            height: key.context.height,
            preview_percent: key.context.preview_percent,
            view_id: key.context.view_id,
            block: frame_block(key.frame_index),
        }
    }

    /// First frame index stored in the block.
    pub fn first_frame(&self) -> i64 {
        self.block * SLOTS_PER_FILE as i64
    }

    /// Parse a file name produced by [`BlockFileName::file_name`].
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(BLOCK_EXTENSION)?.strip_suffix('.')?;

        let (pass, rest) = stem.split_once('-')?;
        let (width, rest) = rest.split_once('x')?;
        let (height, rest) = rest.split_once('-')?;
        let (percent, rest) = rest.split_once("%(")?;
        let (view, rest) = rest.split_once(")-")?;

        Some(Self {
            pass: PassType::from_bit(pass.parse().ok()?)?,
            width: width.parse().ok()?,
            height: height.parse().ok()?,
            preview_percent: percent.parse().ok()?,
            view_id: view.parse().ok()?,
            block: rest.parse().ok()?,
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}-{}x{}-{}%({})-{}.{}",
            self.pass.bit(),
            self.width,
            self.height,
            self.preview_percent,
            self.view_id,
            self.block,
            BLOCK_EXTENSION
        )
    }
}

/// Full path of the block file that stores `key`.
pub fn block_path(root: &Path, scene: &SceneDescriptor, strip_name: &str, key: &CacheKey) -> PathBuf {
    strip_directory(root, scene, strip_name).join(BlockFileName::from_key(key).file_name())
}

/// Whether a path looks like a block file.
pub fn is_block_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(BlockFileName::parse)
        .is_some()
}
