//! Rendered-frame cache for sequencer timelines.
//!
//! An in-memory store of shared frame buffers keyed by strip, render
//! context, frame and pass type, with chain-aware recycling under a byte
//! budget, count-bounded thumbnails, an optional on-disk tier and
//! invalidation that follows the strip dependency graph.

mod buffer;
mod config;
pub mod disk;
mod invalidate;
mod memory;
mod recycle;
mod stats;
mod system;
mod thumbnail;
mod timeline;
mod r#trait;
mod types;

pub use buffer::{FrameBuffer, PixelFormat, CHANNELS};
pub use config::{
    CacheConfig, Compression, DiskStoreConfig, MemoryStoreConfig, SceneDescriptor,
    DEFAULT_DISK_BUDGET, DEFAULT_MEMORY_BUDGET, DEFAULT_STORED_TYPES, DEFAULT_THUMBNAIL_LIMIT,
};
pub use disk::DiskStore;
pub use invalidate::{depends_on, Invalidation, InvalidationRouter, Sweep};
pub use memory::{CacheEntry, MemoryStore};
pub use r#trait::{FrameCache, NoOpCache};
pub use recycle::{choose_victim, extreme_terminals, recycle, RecycleContext, RecycleResult};
pub use stats::{CacheStatistics, CacheStats};
pub use system::SequencerCache;
pub use thumbnail::{
    guaranteed_frame_step, is_guaranteed_frame, ThumbnailStore, Viewport, CHANNEL_MARGIN,
    FRAME_MARGIN,
};
pub use timeline::{
    BlendMode, FrameRange, ManualPrefetch, MemoryTimeline, NoPrefetch, Prefetch, StripInfo,
    StripKind, Timeline,
};
pub use types::{
    CacheError, CacheKey, PassType, PassTypeSet, RenderContext, RenderData, SceneId, StripId,
};
