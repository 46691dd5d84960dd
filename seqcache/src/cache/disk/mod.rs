//! On-disk frame tier.
//!
//! Frames are grouped into block files of 100 consecutive frame indices per
//! (pass, size, preview, view) tuple, one directory per strip. The whole
//! cache root shares one byte budget enforced by deleting least recently
//! used files.

pub mod format;
mod index;
mod maintenance;
mod path;
mod store;
mod version;

pub use format::{
    append_entry, read_entry, AppendOutcome, BlockHeader, DiskFormatError, HeaderSlot,
    HEADER_SIZE, SLOTS_PER_FILE, SLOT_SIZE,
};
pub use index::{BlockIndex, EvictionResult, FileRecord, PopulateStats};
pub use maintenance::{
    clear_disk_cache, collect_garbage, disk_usage, inspect_block, BlockReport, ClearResult,
    SlotReport,
};
pub use path::{
    block_path, frame_block, is_block_file, project_directory, sanitize_component,
    scene_directory, strip_directory, BlockFileName,
};
pub use store::DiskStore;
pub use version::{ensure_version, read_version, DISK_CACHE_VERSION, VERSION_FILE};
