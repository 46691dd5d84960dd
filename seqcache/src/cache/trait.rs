//! Cache trait definition for dependency injection.

use crate::cache::buffer::FrameBuffer;
use crate::cache::stats::{CacheStatistics, CacheStats};
use crate::cache::timeline::StripInfo;
use crate::cache::types::{PassType, RenderData};
use std::any::Any;

/// Frame cache abstraction used by renderers.
///
/// Lets a renderer run against the full two-tier cache or against
/// [`NoOpCache`] without changing its code.
///
/// # Example
///
/// ```
/// use seqcache::cache::{
///     FrameBuffer, FrameCache, NoOpCache, PassType, PixelFormat, RenderContext, RenderData,
///     SceneId, StripId, StripInfo,
/// };
///
/// fn render(cache: &dyn FrameCache, strip: &StripInfo, frame: f32) -> FrameBuffer {
///     let data = RenderData::new(RenderContext::new(SceneId(1), 4, 4));
///     if let Some(buffer) = cache.get(&data, strip, frame, PassType::FinalOut) {
///         return buffer;
///     }
///     let buffer = FrameBuffer::filled(4, 4, PixelFormat::Rgba8, 0);
///     cache.put(&data, strip, frame, PassType::FinalOut, buffer.clone());
///     buffer
/// }
///
/// let strip = StripInfo::media(StripId(1), "clip", 1, 0, 100);
/// let buffer = render(&NoOpCache::new(), &strip, 10.0);
/// assert_eq!(buffer.width(), 4);
/// ```
pub trait FrameCache: Send + Sync {
    /// Cached buffer for `strip` at `timeline_frame`, if any.
    ///
    /// Bypass and proxy requests always miss.
    fn get(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> Option<FrameBuffer>;

    /// Store a rendered buffer.
    ///
    /// Returns `true` if the buffer is now cached. Rejected inserts (empty
    /// buffer, bypass request, key already present) return `false`.
    fn put(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
        buffer: FrameBuffer,
    ) -> bool;

    /// Drop every in-memory entry.
    fn cleanup(&self);

    /// Snapshot of the cache counters.
    fn stats(&self) -> CacheStatistics;

    /// Get a reference to self as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Cache that never stores anything.
///
/// Useful for renders that must not be cached (final exports, debugging)
/// and as a baseline when profiling cache behavior.
#[derive(Debug, Clone, Default)]
pub struct NoOpCache;

impl NoOpCache {
    pub fn new() -> Self {
        Self
    }
}

impl FrameCache for NoOpCache {
    fn get(
        &self,
        _data: &RenderData,
        _strip: &StripInfo,
        _timeline_frame: f32,
        _pass: PassType,
    ) -> Option<FrameBuffer> {
        None
    }

    fn put(
        &self,
        _data: &RenderData,
        _strip: &StripInfo,
        _timeline_frame: f32,
        _pass: PassType,
        _buffer: FrameBuffer,
    ) -> bool {
        false
    }

    fn cleanup(&self) {}

    fn stats(&self) -> CacheStatistics {
        CacheStatistics::from_stats(&CacheStats::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::buffer::PixelFormat;
    use crate::cache::types::{RenderContext, SceneId, StripId};
    use std::sync::Arc;

    fn request() -> (RenderData, StripInfo) {
        let data = RenderData::new(RenderContext::new(SceneId(1), 2, 2));
        let strip = StripInfo::media(StripId(3), "clip", 1, 0, 50);
        (data, strip)
    }

    #[test]
    fn test_noop_cache_always_misses() {
        let cache = NoOpCache::new();
        let (data, strip) = request();
        let buffer = FrameBuffer::filled(2, 2, PixelFormat::Rgba8, 9);

        assert!(!cache.put(&data, &strip, 5.0, PassType::Raw, buffer));
        assert!(cache.get(&data, &strip, 5.0, PassType::Raw).is_none());
    }

    #[test]
    fn test_noop_cache_stats_are_empty() {
        let cache = NoOpCache::new();
        cache.cleanup();

        let stats = cache.stats();
        assert_eq!(stats.stats.memory_hits, 0);
        assert_eq!(stats.stats.memory_entry_count, 0);
    }

    #[test]
    fn test_noop_cache_as_trait_object() {
        let cache: Arc<dyn FrameCache> = Arc::new(NoOpCache::new());
        assert!(cache.as_any().downcast_ref::<NoOpCache>().is_some());
    }

    #[test]
    fn test_noop_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoOpCache>();
    }
}
