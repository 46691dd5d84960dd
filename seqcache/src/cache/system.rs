//! Per-scene cache facade.
//!
//! Ties the memory store, thumbnails, the lazily opened disk tier and
//! invalidation together behind one handle per timeline. All memory state
//! sits behind a single scene lock; disk I/O always happens outside it.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::buffer::FrameBuffer;
use crate::cache::config::{CacheConfig, SceneDescriptor};
use crate::cache::disk::DiskStore;
use crate::cache::invalidate::{Invalidation, InvalidationRouter, Sweep};
use crate::cache::memory::MemoryStore;
use crate::cache::r#trait::FrameCache;
use crate::cache::recycle::{recycle, RecycleContext};
use crate::cache::stats::{CacheStatistics, CacheStats};
use crate::cache::thumbnail::{ThumbnailStore, Viewport};
use crate::cache::timeline::{Prefetch, StripInfo, Timeline};
use crate::cache::types::{CacheError, CacheKey, PassType, PassTypeSet, RenderData, StripId};
use crate::config::format_size;
use crate::log::Logger;
use crate::{log_debug, log_info, log_warn};

/// State guarded by the scene lock.
struct SceneState {
    memory: MemoryStore,
    thumbnails: ThumbnailStore,
}

/// Lifecycle of the disk tier.
enum DiskSlot {
    Unopened,
    Open(Arc<DiskStore>),
    /// Opening failed; not retried for this scene.
    Failed,
}

/// Rendered-frame cache of one scene.
///
/// Lookups go to memory first and then to the disk tier, if configured.
/// Inserts of persisted pass types are written through to disk.
///
/// # Example
///
/// ```
/// use seqcache::cache::{
///     CacheConfig, FrameBuffer, MemoryTimeline, NoPrefetch, PassType, PixelFormat,
///     RenderContext, RenderData, SceneDescriptor, SceneId, SequencerCache, StripId, StripInfo,
/// };
/// use seqcache::log::NoOpLogger;
/// use std::sync::Arc;
///
/// let timeline = Arc::new(MemoryTimeline::new());
/// let strip = StripInfo::media(StripId(1), "clip", 1, 0, 100);
/// timeline.insert(strip.clone());
///
/// let cache = SequencerCache::new(
///     CacheConfig::default(),
///     SceneDescriptor::new(SceneId(1), "project", "Scene"),
///     timeline,
///     Arc::new(NoPrefetch),
///     Arc::new(NoOpLogger),
/// )
/// .unwrap();
///
/// let data = RenderData::new(RenderContext::new(SceneId(1), 8, 8));
/// let frame = FrameBuffer::filled(8, 8, PixelFormat::Rgba8, 255);
/// assert!(cache.put(&data, &strip, 10.0, PassType::FinalOut, frame.clone()));
///
/// let hit = cache.get(&data, &strip, 10.0, PassType::FinalOut).unwrap();
/// assert!(FrameBuffer::ptr_eq(&hit, &frame));
/// ```
pub struct SequencerCache {
    config: CacheConfig,
    scene: SceneDescriptor,
    timeline: Arc<dyn Timeline>,
    prefetch: Arc<dyn Prefetch>,
    state: Mutex<SceneState>,
    disk: Mutex<DiskSlot>,
    stats: Mutex<CacheStats>,
    logger: Arc<dyn Logger>,
}

impl SequencerCache {
    /// Create the cache for one scene.
    ///
    /// The disk tier is opened on first use, not here.
    pub fn new(
        config: CacheConfig,
        scene: SceneDescriptor,
        timeline: Arc<dyn Timeline>,
        prefetch: Arc<dyn Prefetch>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        log_info!(
            logger,
            "[CACHE] Scene '{}': memory budget {}, disk tier {}",
            scene.scene_name,
            format_size(config.memory.max_size_bytes),
            if config.disk.is_enabled() {
                "enabled"
            } else {
                "disabled"
            }
        );

        let state = SceneState {
            memory: MemoryStore::new(config.memory.max_size_bytes),
            thumbnails: ThumbnailStore::new(config.thumbnail_limit),
        };

        Ok(Self {
            config,
            scene,
            timeline,
            prefetch,
            state: Mutex::new(state),
            disk: Mutex::new(DiskSlot::Unopened),
            stats: Mutex::new(CacheStats::new()),
            logger,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneDescriptor {
        &self.scene
    }

    /// Disk tier, opening it on first use.
    pub fn disk_store(&self) -> Option<Arc<DiskStore>> {
        if !self.config.disk.is_enabled() {
            return None;
        }

        let mut slot = self.disk.lock();
        match &*slot {
            DiskSlot::Open(store) => return Some(Arc::clone(store)),
            DiskSlot::Failed => return None,
            DiskSlot::Unopened => {}
        }

        match DiskStore::open(&self.config.disk, self.scene.clone()) {
            Ok(store) => {
                let store = Arc::new(store);
                *slot = DiskSlot::Open(Arc::clone(&store));
                Some(store)
            }
            Err(e) => {
                log_warn!(self.logger, "[CACHE] Disk cache disabled for this scene: {}", e);
                *slot = DiskSlot::Failed;
                None
            }
        }
    }

    /// Build the key for a request.
    ///
    /// RAW and THUMBNAIL entries are keyed by media frame so held frames
    /// share one entry; the other passes by strip-relative frame. Prefetch
    /// renders are keyed under the context playback will ask for.
    pub fn key_for(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> CacheKey {
        let context = if data.is_prefetch_render {
            self.prefetch.original_context(&data.context)
        } else {
            data.context
        };
        let frame_index = match pass {
            PassType::Raw | PassType::Thumbnail => {
                self.timeline.media_frame_index(strip, timeline_frame)
            }
            _ => timeline_frame - strip.start,
        };
        CacheKey::new(strip.id, context, frame_index, timeline_frame, pass)
    }

    /// Pass types kept as permanent entries for `strip`.
    pub fn stored_types(&self, strip: &StripInfo) -> PassTypeSet {
        strip.stored_types.unwrap_or(self.config.stored_types)
    }

    fn recycle_context(&self) -> RecycleContext {
        let protected = if self.config.prefetch_enabled && self.prefetch.is_running() {
            self.prefetch.protected_range()
        } else {
            None
        };
        RecycleContext::new(self.timeline.current_frame()).with_protected(protected)
    }

    /// Recycle under the scene lock. Returns whether the store fits.
    fn recycle_locked(&self, state: &mut SceneState, context: &RecycleContext) -> bool {
        if !state.memory.is_over_budget() {
            return true;
        }
        let result = recycle(&mut state.memory, context);
        if result.chains_removed > 0 {
            self.stats
                .lock()
                .record_recycle(result.chains_removed, result.items_removed);
        }
        result.within_budget
    }

    /// Look up a buffer, falling back to the disk tier.
    pub fn get(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> Option<FrameBuffer> {
        if data.bypasses_cache() {
            return None;
        }
        let key = self.key_for(data, strip, timeline_frame, pass);

        if let Some(buffer) = self.state.lock().memory.get(&key) {
            self.stats.lock().record_memory_hit();
            return Some(buffer);
        }
        self.stats.lock().record_memory_miss();

        if pass == PassType::Thumbnail || !self.stored_types(strip).contains(pass) {
            return None;
        }
        let disk = self.disk_store()?;
        let Some(buffer) = disk.read(&key, &strip.name) else {
            self.stats.lock().record_disk_miss();
            return None;
        };
        self.stats.lock().record_disk_hit();

        let context = self.recycle_context();
        let mut state = self.state.lock();
        if !state.memory.contains(&key) {
            let fits = self.recycle_locked(&mut state, &context);
            if fits || pass != PassType::FinalOut {
                if let Err(e) = state
                    .memory
                    .insert_unlinked(key, buffer.clone(), data.task_id, false)
                {
                    debug_assert!(false, "disk hit re-insert failed: {e}");
                    log_debug!(self.logger, "[CACHE] Disk hit not re-inserted: {}", e);
                }
            }
        }
        Some(buffer)
    }

    /// Insert a rendered buffer, writing persisted types through to disk.
    ///
    /// The buffer is cached even when the budget cannot be met. In that case
    /// the chain it closes is demoted to temp entries.
    pub fn put(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
        buffer: FrameBuffer,
    ) -> bool {
        if buffer.is_empty() || data.bypasses_cache() {
            return false;
        }
        let key = self.key_for(data, strip, timeline_frame, pass);
        let is_temp = !self.stored_types(strip).contains(pass);
        let context = self.recycle_context();

        let persist = {
            let mut state = self.state.lock();
            if state.memory.contains(&key) {
                return false;
            }

            let fits = is_temp || self.recycle_locked(&mut state, &context);
            let inserted = if pass == PassType::Thumbnail {
                state
                    .memory
                    .insert_unlinked(key, buffer.clone(), data.task_id, is_temp)
            } else {
                state.memory.insert(key, buffer.clone(), data.task_id, is_temp)
            };
            if inserted.is_err() {
                return false;
            }

            if !fits && pass == PassType::FinalOut {
                let demoted = state.memory.set_chain_temp(&key);
                log_debug!(
                    self.logger,
                    "[CACHE] Over budget with nothing evictable, demoted {} entries to temp",
                    demoted
                );
            }
            !is_temp
                && pass != PassType::Thumbnail
                && state.memory.entry(&key).is_some_and(|e| !e.is_temp())
        };

        if persist {
            self.write_through(&key, &buffer, strip);
        }
        true
    }

    /// Insert only if the store can be brought within budget first.
    ///
    /// On failure the chain under construction is demoted to temp entries
    /// and `false` is returned; the frame is not cached.
    pub fn put_if_possible(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
        buffer: FrameBuffer,
    ) -> bool {
        if buffer.is_empty() || data.bypasses_cache() {
            return false;
        }
        let context = self.recycle_context();

        {
            let mut state = self.state.lock();
            if !self.recycle_locked(&mut state, &context) {
                match state.memory.last_key().copied() {
                    Some(last) => {
                        state.memory.set_chain_temp(&last);
                    }
                    None => state.memory.clear_last_key(),
                }
                return false;
            }
        }

        self.put(data, strip, timeline_frame, pass, buffer)
    }

    fn write_through(&self, key: &CacheKey, buffer: &FrameBuffer, strip: &StripInfo) {
        let Some(disk) = self.disk_store() else {
            return;
        };
        let written = disk.write(key, buffer, &strip.name);
        let eviction = disk.enforce_limit();

        let mut stats = self.stats.lock();
        stats.record_disk_write(written);
        stats.record_disk_eviction(eviction.files_deleted);
    }

    /// Drop stale temp entries of a render task.
    ///
    /// An entry is stale once its strip no longer displays at
    /// `timeline_frame` or its frame index no longer maps there.
    pub fn free_temp(&self, task_id: u32, timeline_frame: f32) -> usize {
        let timeline = &*self.timeline;
        let freed = self.state.lock().memory.free_temp(task_id, |key| {
            let Some(strip) = timeline.strip(key.strip) else {
                return true;
            };
            if !strip.displays(timeline_frame) {
                return true;
            }
            let expected = match key.pass {
                PassType::Raw | PassType::Thumbnail => {
                    timeline.media_frame_index(&strip, timeline_frame)
                }
                _ => timeline_frame - strip.start,
            };
            key.frame_index != expected
        });

        if freed > 0 {
            self.stats.lock().record_temp_freed(freed);
        }
        freed
    }

    /// Flush every in-memory entry. The disk tier is kept.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let count = state.memory.len();
        state.memory.clear();
        log_debug!(self.logger, "[CACHE] Flushed {} memory entries", count);
    }

    /// Flush memory and delete this scene's disk cache directory.
    pub fn cleanup_all(&self) {
        self.cleanup();
        if let Some(disk) = self.disk_store() {
            let removed = disk.clear_scene();
            log_info!(
                self.logger,
                "[CACHE] Removed {} disk cache files for scene '{}'",
                removed,
                self.scene.scene_name
            );
        }
    }

    /// Change the memory budget, recycling right away if now over it.
    pub fn set_memory_budget(&self, max_size_bytes: usize) {
        let context = self.recycle_context();
        let mut state = self.state.lock();
        state.memory.set_max_size_bytes(max_size_bytes);
        self.recycle_locked(&mut state, &context);
    }

    pub fn memory_budget(&self) -> usize {
        self.state.lock().memory.max_size_bytes()
    }

    pub fn set_thumbnail_limit(&self, limit: usize) {
        self.state.lock().thumbnails.set_limit(limit);
    }

    /// Visit every entry as (strip, timeline frame, pass).
    ///
    /// Returning `false` from the callback stops the walk. The scene lock is
    /// held throughout, so the callback must not call back into the cache.
    pub fn iterate(&self, mut callback: impl FnMut(StripId, f32, PassType) -> bool) {
        let state = self.state.lock();
        for (key, _) in state.memory.iter() {
            if !callback(key.strip, key.timeline_frame, key.pass) {
                break;
            }
        }
    }

    /// Number of in-memory entries.
    pub fn len(&self) -> usize {
        self.state.lock().memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by in-memory entries.
    pub fn size_bytes(&self) -> usize {
        self.state.lock().memory.size_bytes()
    }

    /// Whether a buffer for the request is held in memory.
    pub fn contains(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> bool {
        let key = self.key_for(data, strip, timeline_frame, pass);
        self.state.lock().memory.contains(&key)
    }

    /// Whether the request's entry is a temp entry.
    pub fn is_temp(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> Option<bool> {
        let key = self.key_for(data, strip, timeline_frame, pass);
        self.state.lock().memory.entry(&key).map(|e| e.is_temp())
    }

    /// Insert a timeline thumbnail, evicting off-screen ones over the limit.
    pub fn thumbnail_put(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        buffer: FrameBuffer,
        view: &Viewport,
    ) -> bool {
        if buffer.is_empty() || data.bypasses_cache() {
            return false;
        }
        let key = self.key_for(data, strip, timeline_frame, PassType::Thumbnail);

        let (inserted, evicted) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state
                .thumbnails
                .put(&mut state.memory, key, buffer, view, &*self.timeline)
        };
        if evicted > 0 {
            self.stats.lock().record_thumbnails_evicted(evicted);
        }
        inserted
    }

    /// Drop thumbnails far from `view`.
    pub fn thumbnail_cleanup(&self, view: &Viewport) -> usize {
        let evicted = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state
                .thumbnails
                .cleanup(&mut state.memory, view, &*self.timeline)
        };
        if evicted > 0 {
            self.stats.lock().record_thumbnails_evicted(evicted);
        }
        evicted
    }

    /// Source media of `strip` changed.
    pub fn invalidate_raw(&self, strip: StripId) -> usize {
        self.invalidate_kind(strip, Invalidation::Raw)
    }

    /// Modifiers or transforms of `strip` changed.
    pub fn invalidate_preprocessed(&self, strip: StripId) -> usize {
        self.invalidate_kind(strip, Invalidation::Preprocessed)
    }

    /// Blending of `strip` changed.
    pub fn invalidate_composite(&self, strip: StripId) -> usize {
        self.invalidate_kind(strip, Invalidation::Composite)
    }

    /// Only strips reading `strip` are stale.
    pub fn invalidate_dependent(&self, strip: StripId) -> usize {
        self.invalidate_kind(strip, Invalidation::Dependent)
    }

    /// Invalidate `strip` over the full range of `range_mask`.
    pub fn invalidate_in_range(&self, strip: StripId, range_mask: StripId, types: PassTypeSet) -> usize {
        let sweeps = InvalidationRouter::new(&*self.timeline).plan_in_range(strip, range_mask, types);
        self.apply_sweeps(&sweeps)
    }

    /// Invalidate `strip` for a change to `changed`, without propagation.
    pub fn invalidate(
        &self,
        strip: StripId,
        changed: StripId,
        types: PassTypeSet,
        force_full_range: bool,
    ) -> usize {
        let sweeps: Vec<Sweep> = InvalidationRouter::new(&*self.timeline)
            .plan_single(strip, changed, types, force_full_range)
            .into_iter()
            .collect();
        self.apply_sweeps(&sweeps)
    }

    fn invalidate_kind(&self, strip: StripId, kind: Invalidation) -> usize {
        let sweeps = InvalidationRouter::new(&*self.timeline).plan(strip, kind);
        self.apply_sweeps(&sweeps)
    }

    /// Stop prefetch, then clear disk and memory for each sweep.
    fn apply_sweeps(&self, sweeps: &[Sweep]) -> usize {
        if sweeps.is_empty() {
            return 0;
        }
        self.prefetch.stop();

        if let Some(disk) = self.disk_store() {
            for sweep in sweeps {
                disk.invalidate(&sweep.strip, sweep.range, sweep.types);
            }
        }

        let removed: usize = {
            let mut state = self.state.lock();
            let removed = sweeps.iter().map(|s| s.apply(&mut state.memory)).sum();
            // Survivors of a swept chain must not be extended by the next put.
            state.memory.clear_last_key();
            removed
        };

        log_debug!(
            self.logger,
            "[CACHE] Invalidation removed {} entries in {} sweeps",
            removed,
            sweeps.len()
        );
        if removed > 0 {
            self.stats.lock().record_invalidated(removed);
        }
        removed
    }

    /// Current counters with size snapshots filled in.
    pub fn stats(&self) -> CacheStatistics {
        let (size, count) = {
            let state = self.state.lock();
            (state.memory.size_bytes(), state.memory.len())
        };
        let disk = match &*self.disk.lock() {
            DiskSlot::Open(store) => Some((store.total_size(), store.file_count())),
            _ => None,
        };

        let mut stats = self.stats.lock().clone();
        stats.update_memory_size(size, count);
        if let Some((bytes, files)) = disk {
            stats.update_disk_size(bytes, files);
        }
        CacheStatistics::from_stats(&stats)
    }

    /// Human-readable statistics report.
    pub fn format_stats(&self) -> String {
        self.stats().format(&self.scene.scene_name)
    }
}

impl FrameCache for SequencerCache {
    fn get(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
    ) -> Option<FrameBuffer> {
        self.get(data, strip, timeline_frame, pass)
    }

    fn put(
        &self,
        data: &RenderData,
        strip: &StripInfo,
        timeline_frame: f32,
        pass: PassType,
        buffer: FrameBuffer,
    ) -> bool {
        self.put(data, strip, timeline_frame, pass, buffer)
    }

    fn cleanup(&self) {
        self.cleanup()
    }

    fn stats(&self) -> CacheStatistics {
        self.stats()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
