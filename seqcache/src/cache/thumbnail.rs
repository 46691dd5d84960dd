//! Timeline thumbnails.
//!
//! Thumbnails live in the memory store but outside the chain model. Once
//! their count passes the limit, entries far from the visible part of the
//! timeline are dropped. A sparse per-strip grid of "guaranteed" frames is
//! always kept so scrolling back never starts from an empty strip.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::buffer::FrameBuffer;
use crate::cache::memory::MemoryStore;
use crate::cache::timeline::{StripInfo, Timeline};
use crate::cache::types::{CacheKey, PassType, StripId};

/// Frames kept beyond each horizontal edge of the view.
pub const FRAME_MARGIN: f32 = 200.0;

/// Channels kept beyond each vertical edge of the view.
pub const CHANNEL_MARGIN: f32 = 1.0;

/// Upper bound on guaranteed thumbnails per strip.
const MAX_GUARANTEED_PER_STRIP: i32 = 30;

/// Visible part of the timeline, in frames and channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub frame_start: f32,
    pub frame_end: f32,
    pub channel_bottom: f32,
    pub channel_top: f32,
}

impl Viewport {
    pub fn new(frame_start: f32, frame_end: f32, channel_bottom: f32, channel_top: f32) -> Self {
        Self {
            frame_start,
            frame_end,
            channel_bottom,
            channel_top,
        }
    }

    /// The view grown by the retention margins.
    pub fn with_margins(self) -> Self {
        Self {
            frame_start: self.frame_start - FRAME_MARGIN,
            frame_end: self.frame_end + FRAME_MARGIN,
            channel_bottom: self.channel_bottom - CHANNEL_MARGIN,
            channel_top: self.channel_top + CHANNEL_MARGIN,
        }
    }

    pub fn contains(&self, timeline_frame: f32, channel: i32) -> bool {
        let channel = channel as f32;
        timeline_frame >= self.frame_start
            && timeline_frame <= self.frame_end
            && channel >= self.channel_bottom
            && channel <= self.channel_top
    }
}

/// Spacing of the guaranteed thumbnail grid for a strip.
pub fn guaranteed_frame_step(strip: &StripInfo) -> i32 {
    let length = (strip.right_handle - strip.left_handle).max(1);
    let count = (length / 100).min(MAX_GUARANTEED_PER_STRIP);
    if count > 0 {
        length / count
    } else {
        length
    }
}

/// Whether `timeline_frame` is on the strip's guaranteed grid.
pub fn is_guaranteed_frame(strip: &StripInfo, timeline_frame: f32) -> bool {
    let offset = timeline_frame as i32 - strip.left_handle;
    offset % guaranteed_frame_step(strip) == 0
}

/// Count-bounded thumbnail index over the memory store.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailStore {
    limit: usize,
}

impl ThumbnailStore {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Insert a thumbnail, cleaning up against `view` once over the limit.
    ///
    /// Existing keys are left untouched and `false` is returned. The second
    /// value is the number of thumbnails evicted.
    pub fn put(
        &self,
        store: &mut MemoryStore,
        key: CacheKey,
        buffer: FrameBuffer,
        view: &Viewport,
        timeline: &dyn Timeline,
    ) -> (bool, usize) {
        debug_assert_eq!(key.pass, PassType::Thumbnail);
        if store.contains(&key) || store.insert_unlinked(key, buffer, 0, false).is_err() {
            return (false, 0);
        }

        let evicted = if store.thumbnail_count() > self.limit {
            self.cleanup(store, view, timeline)
        } else {
            0
        };
        (true, evicted)
    }

    /// Drop thumbnails outside the margin-expanded view.
    ///
    /// Thumbnails on a guaranteed frame are kept. Thumbnails of strips that
    /// no longer exist are dropped. Returns the number removed.
    pub fn cleanup(&self, store: &mut MemoryStore, view: &Viewport, timeline: &dyn Timeline) -> usize {
        let area = view.with_margins();
        let mut strips: HashMap<StripId, Option<StripInfo>> = HashMap::new();

        let removed = store.remove_where(|key, _| {
            if key.pass != PassType::Thumbnail {
                return false;
            }
            let strip = strips
                .entry(key.strip)
                .or_insert_with(|| timeline.strip(key.strip));
            match strip {
                Some(strip) => {
                    !is_guaranteed_frame(strip, key.timeline_frame)
                        && !area.contains(key.timeline_frame, strip.channel)
                }
                None => true,
            }
        });

        if removed > 0 {
            debug!(
                removed,
                remaining = store.thumbnail_count(),
                "Evicted thumbnails outside view"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::buffer::PixelFormat;
    use crate::cache::timeline::MemoryTimeline;
    use crate::cache::types::{RenderContext, SceneId};

    fn thumb(strip: u64, frame: f32) -> CacheKey {
        let context = RenderContext::new(SceneId(1), 4, 4);
        CacheKey::new(StripId(strip), context, frame, frame, PassType::Thumbnail)
    }

    fn buffer() -> FrameBuffer {
        FrameBuffer::filled(4, 4, PixelFormat::Rgba8, 0)
    }

    fn timeline() -> MemoryTimeline {
        let timeline = MemoryTimeline::new();
        // 1000 frames: 10 guaranteed thumbnails, one every 100 frames
        timeline.insert(StripInfo::media(StripId(1), "long", 1, 0, 1000));
        timeline.insert(StripInfo::media(StripId(2), "high", 5, 0, 1000));
        timeline
    }

    #[test]
    fn test_guaranteed_step() {
        let short = StripInfo::media(StripId(1), "short", 1, 0, 50);
        assert_eq!(guaranteed_frame_step(&short), 50);

        let long = StripInfo::media(StripId(1), "long", 1, 0, 1000);
        assert_eq!(guaranteed_frame_step(&long), 100);

        let very_long = StripInfo::media(StripId(1), "very long", 1, 0, 9000);
        assert_eq!(guaranteed_frame_step(&very_long), 300);

        assert!(is_guaranteed_frame(&long, 300.0));
        assert!(!is_guaranteed_frame(&long, 301.0));
    }

    #[test]
    fn test_viewport_margins() {
        let area = Viewport::new(100.0, 200.0, 2.0, 4.0).with_margins();
        assert!(area.contains(-100.0, 1));
        assert!(area.contains(400.0, 5));
        assert!(!area.contains(401.0, 3));
        assert!(!area.contains(150.0, 6));
    }

    #[test]
    fn test_put_rejects_existing_key() {
        let mut store = MemoryStore::new(usize::MAX);
        let thumbnails = ThumbnailStore::new(10);
        let view = Viewport::new(0.0, 100.0, 0.0, 10.0);
        let timeline = timeline();
        let first = buffer();

        assert!(thumbnails.put(&mut store, thumb(1, 5.0), first.clone(), &view, &timeline).0);
        assert!(!thumbnails.put(&mut store, thumb(1, 5.0), buffer(), &view, &timeline).0);

        assert!(FrameBuffer::ptr_eq(&store.get(&thumb(1, 5.0)).unwrap(), &first));
        assert_eq!(store.thumbnail_count(), 1);
    }

    #[test]
    fn test_cleanup_keeps_visible_and_guaranteed() {
        let mut store = MemoryStore::new(usize::MAX);
        let thumbnails = ThumbnailStore::new(4);
        let view = Viewport::new(0.0, 100.0, 0.0, 2.0);
        let timeline = timeline();

        let visible = thumb(1, 50.0);
        let in_margin = thumb(1, 290.0);
        let guaranteed = thumb(1, 700.0);
        let far = thumb(1, 701.0);
        let wrong_channel = thumb(2, 51.0);

        for key in [visible, in_margin, guaranteed, far] {
            thumbnails.put(&mut store, key, buffer(), &view, &timeline);
        }
        let (inserted, evicted) = thumbnails.put(&mut store, wrong_channel, buffer(), &view, &timeline);

        assert!(inserted);
        assert_eq!(evicted, 2);
        assert!(store.contains(&visible));
        assert!(store.contains(&in_margin));
        assert!(store.contains(&guaranteed));
        assert!(!store.contains(&far));
        assert!(!store.contains(&wrong_channel));
        assert_eq!(store.thumbnail_count(), 3);
    }

    #[test]
    fn test_cleanup_drops_removed_strips() {
        let mut store = MemoryStore::new(usize::MAX);
        let thumbnails = ThumbnailStore::new(100);
        let view = Viewport::new(0.0, 100.0, 0.0, 10.0);
        let timeline = timeline();

        thumbnails.put(&mut store, thumb(9, 0.0), buffer(), &view, &timeline);
        assert_eq!(thumbnails.cleanup(&mut store, &view, &timeline), 1);
        assert_eq!(store.thumbnail_count(), 0);
    }

    #[test]
    fn test_cleanup_ignores_other_passes() {
        let mut store = MemoryStore::new(usize::MAX);
        let thumbnails = ThumbnailStore::new(0);
        let view = Viewport::new(0.0, 10.0, 0.0, 1.0);
        let raw = CacheKey::new(StripId(1), RenderContext::new(SceneId(1), 4, 4), 900.0, 900.0, PassType::Raw);
        store.insert(raw, buffer(), 0, false).unwrap();

        thumbnails.cleanup(&mut store, &view, &timeline());
        assert!(store.contains(&raw));
    }
}
