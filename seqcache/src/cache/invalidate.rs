//! Invalidation routing across the strip dependency graph.
//!
//! An edit to one strip is turned into a list of [`Sweep`]s: one for the
//! strip itself, one per dependent strip, and a full sweep of every
//! enclosing meta-strip. Planning only reads the timeline; the facade applies
//! each sweep to disk and then to memory under the scene lock.

use std::collections::HashSet;

use crate::cache::memory::MemoryStore;
use crate::cache::timeline::{FrameRange, StripInfo, StripKind, Timeline};
use crate::cache::types::{PassType, PassTypeSet, StripId};

/// Which part of a strip's output became stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// Source media changed; everything goes
    Raw,
    /// Modifiers or transforms changed
    Preprocessed,
    /// Blending changed
    Composite,
    /// Only strips reading this one are stale
    Dependent,
}

impl Invalidation {
    /// Pass types removed from the strip itself.
    pub fn types(self) -> PassTypeSet {
        match self {
            Invalidation::Raw => PassTypeSet::all(),
            Invalidation::Preprocessed => {
                PassType::Preprocessed | PassType::Composite | PassType::FinalOut
            }
            Invalidation::Composite | Invalidation::Dependent => {
                PassType::Composite | PassType::FinalOut
            }
        }
    }

    fn includes_self(self) -> bool {
        !matches!(self, Invalidation::Dependent)
    }

    fn skips_sound(self) -> bool {
        matches!(self, Invalidation::Composite | Invalidation::Dependent)
    }
}

/// One targeted removal.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Strip whose own entries are removed
    pub strip: StripInfo,
    /// Range for COMPOSITE and FINAL_OUT entries of any strip
    pub range: FrameRange,
    /// Range for the strip's own entries
    pub changed_range: FrameRange,
    pub types: PassTypeSet,
}

impl Sweep {
    /// Sweep of `strip` caused by a change to `changed`.
    ///
    /// Unless `force_full_range` is set, the merged-output range is clipped
    /// to `strip`'s own display range.
    pub fn new(strip: &StripInfo, changed: &StripInfo, types: PassTypeSet, force_full_range: bool) -> Self {
        let changed_range = changed.display_range();
        let range = if force_full_range {
            changed_range
        } else {
            let own = strip.display_range();
            FrameRange::new(changed_range.start.max(own.start), changed_range.end.min(own.end))
        };

        Self {
            strip: strip.clone(),
            range,
            changed_range,
            types,
        }
    }

    /// Remove matching entries from `store`, unlinking each first.
    pub fn apply(&self, store: &mut MemoryStore) -> usize {
        let merged = self
            .types
            .intersection(PassType::Composite | PassType::FinalOut);
        let source = self
            .types
            .intersection(PassType::Raw | PassType::Preprocessed | PassType::Thumbnail);

        store.remove_where(|key, _| {
            let merged_hit = merged.contains(key.pass) && self.range.contains(key.timeline_frame);
            let source_hit = source.contains(key.pass)
                && key.strip == self.strip.id
                && self.changed_range.contains(key.timeline_frame);
            merged_hit || source_hit
        })
    }
}

/// Whether `cur`'s output depends on `changed`.
///
/// Direct inputs always depend. Otherwise `cur` must overlap `changed` in
/// time, sit on the same or a higher channel and actually read what is
/// below it: an opaque non-effect strip hides lower channels.
pub fn depends_on(changed: &StripInfo, cur: &StripInfo) -> bool {
    if cur.inputs.contains(&changed.id) {
        return true;
    }
    if changed.left_handle >= cur.right_handle || cur.left_handle >= changed.right_handle {
        return false;
    }
    if cur.channel < changed.channel {
        return false;
    }
    if cur.kind != StripKind::Effect && cur.blend.is_opaque() {
        return false;
    }
    true
}

/// Plans invalidation sweeps from timeline queries.
pub struct InvalidationRouter<'a> {
    timeline: &'a dyn Timeline,
}

impl<'a> InvalidationRouter<'a> {
    pub fn new(timeline: &'a dyn Timeline) -> Self {
        Self { timeline }
    }

    /// Sweeps for an edit of the given kind to `strip`.
    pub fn plan(&self, strip: StripId, kind: Invalidation) -> Vec<Sweep> {
        let mut sweeps = Vec::new();
        let mut visited = HashSet::new();
        self.plan_into(strip, kind, &mut sweeps, &mut visited);
        sweeps
    }

    /// Sweep of `strip` over `range_mask`'s full range, without dependents.
    ///
    /// An enclosing meta-strip is still invalidated in full.
    pub fn plan_in_range(&self, strip: StripId, range_mask: StripId, types: PassTypeSet) -> Vec<Sweep> {
        let (Some(info), Some(mask)) = (self.timeline.strip(strip), self.timeline.strip(range_mask)) else {
            return Vec::new();
        };

        let mut sweeps = vec![Sweep::new(&info, &mask, types, true)];
        let mut visited = HashSet::from([strip]);
        self.plan_parent_meta(&info, &mut sweeps, &mut visited);
        sweeps
    }

    /// Sweep of `strip` for a change to `changed`, with nothing else.
    pub fn plan_single(
        &self,
        strip: StripId,
        changed: StripId,
        types: PassTypeSet,
        force_full_range: bool,
    ) -> Option<Sweep> {
        let info = self.timeline.strip(strip)?;
        let changed = self.timeline.strip(changed)?;
        Some(Sweep::new(&info, &changed, types, force_full_range))
    }

    fn plan_into(
        &self,
        strip: StripId,
        kind: Invalidation,
        sweeps: &mut Vec<Sweep>,
        visited: &mut HashSet<StripId>,
    ) {
        if !visited.insert(strip) {
            return;
        }
        let Some(info) = self.timeline.strip(strip) else {
            return;
        };
        if kind.skips_sound() && info.kind == StripKind::Sound {
            return;
        }

        if kind.includes_self() {
            sweeps.push(Sweep::new(&info, &info, kind.types(), false));
        }
        self.plan_dependents(&info, &self.timeline.top_level(), sweeps);
        self.plan_parent_meta(&info, sweeps, visited);
    }

    fn plan_dependents(&self, changed: &StripInfo, candidates: &[StripId], sweeps: &mut Vec<Sweep>) {
        for &id in candidates {
            let Some(cur) = self.timeline.strip(id) else {
                continue;
            };
            if cur.id != changed.id && cur.kind != StripKind::Sound && depends_on(changed, &cur) {
                // Effects recompute from their inputs, so nothing of theirs survives.
                let types = if cur.kind == StripKind::Effect {
                    PassTypeSet::all()
                } else {
                    PassType::Composite | PassType::FinalOut
                };
                sweeps.push(Sweep::new(&cur, changed, types, false));
            }
            if cur.kind == StripKind::Meta {
                self.plan_dependents(changed, &self.timeline.children(cur.id), sweeps);
            }
        }
    }

    fn plan_parent_meta(&self, strip: &StripInfo, sweeps: &mut Vec<Sweep>, visited: &mut HashSet<StripId>) {
        if let Some(parent) = strip.parent {
            self.plan_into(parent, Invalidation::Raw, sweeps, visited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::buffer::{FrameBuffer, PixelFormat};
    use crate::cache::timeline::{BlendMode, MemoryTimeline};
    use crate::cache::types::{CacheKey, RenderContext, SceneId};

    fn key(strip: u64, frame: f32, pass: PassType) -> CacheKey {
        CacheKey::new(StripId(strip), RenderContext::new(SceneId(1), 4, 4), frame, frame, pass)
    }

    fn put(store: &mut MemoryStore, key: CacheKey) {
        store
            .insert(key, FrameBuffer::filled(4, 4, PixelFormat::Rgba8, 0), 0, false)
            .unwrap();
    }

    fn swept_ids(sweeps: &[Sweep]) -> Vec<u64> {
        sweeps.iter().map(|s| s.strip.id.0).collect()
    }

    #[test]
    fn test_invalidation_types() {
        assert_eq!(Invalidation::Raw.types(), PassTypeSet::all());
        assert_eq!(Invalidation::Preprocessed.types().bits(), 2 | 4 | 8);
        assert_eq!(Invalidation::Composite.types().bits(), 4 | 8);
    }

    #[test]
    fn test_depends_on_rules() {
        let base = StripInfo::media(StripId(1), "base", 2, 0, 100);

        let above = StripInfo::media(StripId(2), "above", 3, 50, 100);
        assert!(depends_on(&base, &above));

        let below = StripInfo::media(StripId(3), "below", 1, 0, 100);
        assert!(!depends_on(&base, &below));

        let later = StripInfo::media(StripId(4), "later", 3, 100, 50);
        assert!(!depends_on(&base, &later));

        let opaque = above.clone().with_blend(BlendMode::Replace);
        assert!(!depends_on(&base, &opaque));

        let full_cross = above.clone().with_blend(BlendMode::Cross { opacity: 100.0 });
        assert!(!depends_on(&base, &full_cross));

        let opaque_effect = opaque.clone().with_kind(StripKind::Effect);
        assert!(depends_on(&base, &opaque_effect));

        let input_far_away = StripInfo::media(StripId(5), "fx", 1, 500, 10)
            .with_kind(StripKind::Effect)
            .with_inputs(vec![StripId(1)]);
        assert!(depends_on(&base, &input_far_away));
    }

    #[test]
    fn test_sweep_ranges() {
        let changed = StripInfo::media(StripId(1), "a", 1, 0, 100);
        let other = StripInfo::media(StripId(2), "b", 2, 50, 100);

        let clipped = Sweep::new(&other, &changed, PassTypeSet::all(), false);
        assert_eq!(clipped.range, FrameRange::new(50.0, 100.0));
        assert_eq!(clipped.changed_range, FrameRange::new(0.0, 100.0));

        let forced = Sweep::new(&other, &changed, PassTypeSet::all(), true);
        assert_eq!(forced.range, FrameRange::new(0.0, 100.0));
    }

    #[test]
    fn test_sweep_apply_merged_and_source() {
        let changed = StripInfo::media(StripId(1), "a", 1, 0, 100);
        let mut store = MemoryStore::new(usize::MAX);

        put(&mut store, key(1, 10.0, PassType::Raw));
        put(&mut store, key(2, 10.0, PassType::Raw));
        put(&mut store, key(9, 10.0, PassType::FinalOut));
        put(&mut store, key(9, 150.0, PassType::FinalOut));
        put(&mut store, key(1, 150.0, PassType::Raw));

        let removed = Sweep::new(&changed, &changed, PassTypeSet::all(), false).apply(&mut store);

        assert_eq!(removed, 2);
        assert!(!store.contains(&key(1, 10.0, PassType::Raw)));
        assert!(!store.contains(&key(9, 10.0, PassType::FinalOut)));
        assert!(store.contains(&key(2, 10.0, PassType::Raw)));
        assert!(store.contains(&key(9, 150.0, PassType::FinalOut)));
        assert!(store.contains(&key(1, 150.0, PassType::Raw)));
    }

    #[test]
    fn test_sweep_apply_removes_composite_of_any_strip() {
        let changed = StripInfo::media(StripId(1), "a", 1, 0, 100);
        let mut store = MemoryStore::new(usize::MAX);

        put(&mut store, key(2, 40.0, PassType::Composite));
        put(&mut store, key(3, 90.0, PassType::Composite));
        put(&mut store, key(3, 90.0, PassType::Preprocessed));
        put(&mut store, key(3, 120.0, PassType::Composite));

        let removed = Sweep::new(&changed, &changed, PassType::Composite | PassType::FinalOut, false)
            .apply(&mut store);

        assert_eq!(removed, 2);
        assert!(!store.contains(&key(2, 40.0, PassType::Composite)));
        assert!(!store.contains(&key(3, 90.0, PassType::Composite)));
        assert!(store.contains(&key(3, 90.0, PassType::Preprocessed)));
        assert!(store.contains(&key(3, 120.0, PassType::Composite)));
    }

    #[test]
    fn test_plan_composite_reaches_dependents() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(1), "a", 1, 0, 100));
        timeline.insert(StripInfo::media(StripId(2), "over", 2, 20, 100));
        timeline.insert(StripInfo::media(StripId(3), "under", 0, 0, 100));
        timeline.insert(StripInfo::media(StripId(4), "apart", 5, 300, 10));

        let sweeps = InvalidationRouter::new(&timeline).plan(StripId(1), Invalidation::Composite);

        assert_eq!(swept_ids(&sweeps), vec![1, 2]);
        assert_eq!(sweeps[1].types, PassType::Composite | PassType::FinalOut);
    }

    #[test]
    fn test_plan_dependent_skips_self_and_sound() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(1), "a", 1, 0, 100));
        timeline.insert(StripInfo::media(StripId(2), "over", 2, 0, 100));
        timeline.insert(StripInfo::media(StripId(3), "audio", 1, 0, 100).with_kind(StripKind::Sound));
        let router = InvalidationRouter::new(&timeline);

        assert_eq!(swept_ids(&router.plan(StripId(1), Invalidation::Dependent)), vec![2]);
        assert!(router.plan(StripId(3), Invalidation::Composite).is_empty());
        assert!(!router.plan(StripId(3), Invalidation::Raw).is_empty());
    }

    #[test]
    fn test_plan_effect_dependents_lose_everything() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(1), "a", 1, 0, 100));
        timeline.insert(
            StripInfo::media(StripId(2), "blur", 2, 0, 100)
                .with_kind(StripKind::Effect)
                .with_inputs(vec![StripId(1)]),
        );

        let sweeps = InvalidationRouter::new(&timeline).plan(StripId(1), Invalidation::Preprocessed);

        assert_eq!(sweeps[1].strip.id, StripId(2));
        assert_eq!(sweeps[1].types, PassTypeSet::all());
    }

    #[test]
    fn test_plan_nested_strip_invalidates_meta() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(10), "meta", 1, 0, 200).with_kind(StripKind::Meta));
        timeline.insert(StripInfo::media(StripId(11), "inner", 1, 0, 100).with_parent(StripId(10)));

        let sweeps = InvalidationRouter::new(&timeline).plan(StripId(11), Invalidation::Composite);

        let meta = sweeps
            .iter()
            .find(|s| s.strip.id == StripId(10) && s.types == PassTypeSet::all())
            .unwrap();
        assert_eq!(meta.changed_range, FrameRange::new(0.0, 200.0));
    }

    #[test]
    fn test_plan_dependents_inside_meta() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(1), "a", 1, 0, 100));
        timeline.insert(StripInfo::media(StripId(10), "meta", 0, 0, 100).with_kind(StripKind::Meta));
        timeline.insert(StripInfo::media(StripId(11), "inner", 3, 0, 100).with_parent(StripId(10)));

        let sweeps = InvalidationRouter::new(&timeline).plan(StripId(1), Invalidation::Composite);

        assert!(swept_ids(&sweeps).contains(&11));
        assert!(!swept_ids(&sweeps).contains(&10));
    }

    #[test]
    fn test_plan_in_range_uses_mask_range() {
        let timeline = MemoryTimeline::new();
        timeline.insert(StripInfo::media(StripId(1), "a", 1, 0, 100));
        timeline.insert(StripInfo::media(StripId(2), "mask", 1, 500, 100));
        timeline.insert(StripInfo::media(StripId(3), "over", 2, 0, 100));

        let sweeps = InvalidationRouter::new(&timeline).plan_in_range(StripId(1), StripId(2), PassTypeSet::all());

        assert_eq!(swept_ids(&sweeps), vec![1]);
        assert_eq!(sweeps[0].range, FrameRange::new(500.0, 600.0));
    }

    #[test]
    fn test_plan_unknown_strip() {
        let timeline = MemoryTimeline::new();
        let router = InvalidationRouter::new(&timeline);
        assert!(router.plan(StripId(1), Invalidation::Raw).is_empty());
        assert!(router.plan_single(StripId(1), StripId(1), PassTypeSet::all(), false).is_none());
    }
}
