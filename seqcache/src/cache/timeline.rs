//! Boundary to the timeline model and the prefetch scheduler.
//!
//! The cache does not own strips or schedule renders. It queries strip
//! geometry through [`Timeline`] and asks [`Prefetch`] which frames the
//! background job is currently producing.
//!
//! Implementations are called while the cache's scene lock is held and must
//! not call back into the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::cache::types::{PassTypeSet, RenderContext, StripId};

/// Inclusive frame interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRange {
    pub start: f32,
    pub end: f32,
}

impl FrameRange {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, frame: f32) -> bool {
        frame >= self.start && frame <= self.end
    }
}

/// What a strip is, as far as invalidation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripKind {
    /// Movie, image sequence or still image
    Media,
    /// Effect combining one or more input strips
    Effect,
    /// Container of other strips
    Meta,
    /// Audio; never produces images
    Sound,
}

/// How a strip is blended over the channels below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendMode {
    /// Fully covers lower channels
    Replace,
    /// Cross-fade with the given opacity (0–100)
    Cross { opacity: f32 },
    /// Any other blend that reads lower channels
    Blend,
}

impl BlendMode {
    /// Whether the strip hides everything below it.
    pub fn is_opaque(self) -> bool {
        match self {
            BlendMode::Replace => true,
            BlendMode::Cross { opacity } => opacity >= 100.0,
            BlendMode::Blend => false,
        }
    }
}

/// Snapshot of the strip properties the cache depends on.
#[derive(Debug, Clone)]
pub struct StripInfo {
    pub id: StripId,
    /// Display name, used for disk cache directories
    pub name: String,
    pub kind: StripKind,
    /// Channel (track) number; higher channels draw on top
    pub channel: i32,
    /// First displayed timeline frame
    pub left_handle: i32,
    /// Timeline frame just past the last displayed one
    pub right_handle: i32,
    /// Timeline frame where the content starts
    pub start: f32,
    /// Number of content frames
    pub content_length: i32,
    pub blend: BlendMode,
    /// Strips this one reads as inputs (effects)
    pub inputs: Vec<StripId>,
    /// Containing meta-strip, if any
    pub parent: Option<StripId>,
    /// Per-strip override of the persisted pass types
    pub stored_types: Option<PassTypeSet>,
}

impl StripInfo {
    /// A media strip showing `length` frames starting at `start`.
    pub fn media(id: StripId, name: impl Into<String>, channel: i32, start: i32, length: i32) -> Self {
        Self {
            id,
            name: name.into(),
            kind: StripKind::Media,
            channel,
            left_handle: start,
            right_handle: start + length,
            start: start as f32,
            content_length: length,
            blend: BlendMode::Blend,
            inputs: Vec::new(),
            parent: None,
            stored_types: None,
        }
    }

    pub fn with_kind(mut self, kind: StripKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<StripId>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_parent(mut self, parent: StripId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_stored_types(mut self, types: PassTypeSet) -> Self {
        self.stored_types = Some(types);
        self
    }

    /// Displayed timeline range, inclusive of both handles.
    pub fn display_range(&self) -> FrameRange {
        FrameRange::new(self.left_handle as f32, self.right_handle as f32)
    }

    /// Whether the strip is displayed at `timeline_frame`.
    pub fn displays(&self, timeline_frame: f32) -> bool {
        self.display_range().contains(timeline_frame)
    }

    /// Last frame of the content on the timeline.
    pub fn content_end(&self) -> i32 {
        self.start as i32 + self.content_length
    }
}

/// Read access to the timeline model.
pub trait Timeline: Send + Sync {
    /// Current properties of a strip, or `None` if it no longer exists.
    fn strip(&self, id: StripId) -> Option<StripInfo>;

    /// Strips at the top level of the scene, in any order.
    fn top_level(&self) -> Vec<StripId>;

    /// Strips contained in a meta-strip.
    fn children(&self, meta: StripId) -> Vec<StripId>;

    /// Map a timeline frame into the strip's media frame range.
    ///
    /// Stills and held frames map many timeline frames to one index.
    fn media_frame_index(&self, strip: &StripInfo, timeline_frame: f32) -> f32;

    /// Frame under the playback cursor.
    fn current_frame(&self) -> f32;
}

/// Query points of the background prefetch job.
pub trait Prefetch: Send + Sync {
    /// Whether the job is currently rendering.
    fn is_running(&self) -> bool;

    /// Frames the running job is producing. Only meaningful while running.
    fn protected_range(&self) -> Option<FrameRange>;

    /// Stop the job and wait for in-flight renders to finish.
    fn stop(&self);

    /// Context the playback path uses for frames rendered by the job.
    fn original_context(&self, context: &RenderContext) -> RenderContext {
        *context
    }
}

/// Prefetch stand-in for timelines without a background job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrefetch;

impl Prefetch for NoPrefetch {
    fn is_running(&self) -> bool {
        false
    }

    fn protected_range(&self) -> Option<FrameRange> {
        None
    }

    fn stop(&self) {}
}

#[derive(Debug, Default)]
struct TimelineState {
    strips: HashMap<StripId, StripInfo>,
    current_frame: f32,
}

/// Minimal in-memory timeline model.
///
/// Suitable for embedders that keep their own strip data elsewhere and mirror
/// it here, and for exercising the cache without an editor.
#[derive(Debug, Default)]
pub struct MemoryTimeline {
    state: RwLock<TimelineState>,
}

impl MemoryTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a strip.
    pub fn insert(&self, strip: StripInfo) {
        self.state.write().strips.insert(strip.id, strip);
    }

    pub fn remove(&self, id: StripId) -> Option<StripInfo> {
        self.state.write().strips.remove(&id)
    }

    /// Apply an edit to a strip in place.
    pub fn update(&self, id: StripId, edit: impl FnOnce(&mut StripInfo)) -> bool {
        match self.state.write().strips.get_mut(&id) {
            Some(strip) => {
                edit(strip);
                true
            }
            None => false,
        }
    }

    pub fn set_current_frame(&self, frame: f32) {
        self.state.write().current_frame = frame;
    }
}

impl Timeline for MemoryTimeline {
    fn strip(&self, id: StripId) -> Option<StripInfo> {
        self.state.read().strips.get(&id).cloned()
    }

    fn top_level(&self) -> Vec<StripId> {
        let state = self.state.read();
        let mut ids: Vec<StripId> = state
            .strips
            .values()
            .filter(|s| s.parent.is_none())
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids
    }

    fn children(&self, meta: StripId) -> Vec<StripId> {
        let state = self.state.read();
        let mut ids: Vec<StripId> = state
            .strips
            .values()
            .filter(|s| s.parent == Some(meta))
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids
    }

    fn media_frame_index(&self, strip: &StripInfo, timeline_frame: f32) -> f32 {
        let last = (strip.content_length - 1).max(0) as f32;
        (timeline_frame - strip.start).clamp(0.0, last).floor()
    }

    fn current_frame(&self) -> f32 {
        self.state.read().current_frame
    }
}

/// Prefetch job state that tests and embedders can drive by hand.
#[derive(Debug, Default)]
pub struct ManualPrefetch {
    range: RwLock<Option<FrameRange>>,
    stops: AtomicUsize,
}

impl ManualPrefetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the job as running over `range`.
    pub fn start(&self, range: FrameRange) {
        *self.range.write() = Some(range);
    }

    /// Number of times `stop` has been requested.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl Prefetch for ManualPrefetch {
    fn is_running(&self) -> bool {
        self.range.read().is_some()
    }

    fn protected_range(&self) -> Option<FrameRange> {
        *self.range.read()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
        *self.range.write() = None;
    }
}
