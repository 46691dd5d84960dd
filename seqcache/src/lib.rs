//! seqcache - rendered-frame cache for video sequencer timelines
//!
//! This library caches the intermediate and final frames a sequencer
//! renders: a memory store with chain-aware recycling, an optional
//! size-bounded disk tier, timeline thumbnails and invalidation that
//! follows the strip dependency graph.
//!
//! # High-Level API
//!
//! Each timeline owns one [`cache::SequencerCache`]:
//!
//! ```ignore
//! use seqcache::cache::{CacheConfig, SceneDescriptor, SequencerCache};
//!
//! let cache = SequencerCache::new(config, scene, timeline, prefetch, logger)?;
//! if let Some(frame) = cache.get(&data, &strip, timeline_frame, PassType::FinalOut) {
//!     // show it
//! }
//! ```

pub mod cache;
pub mod config;
pub mod log;
pub mod logging;

/// Version of the seqcache library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
