//! Victim selection under memory pressure.
//!
//! # Policy
//!
//! Only the two extreme chain terminals (smallest and largest timeline frame)
//! are considered. While a prefetch job runs, a candidate outside its
//! protected range is preferred and nothing is evicted if both lie inside.
//! Otherwise the candidate farther from the playback frame goes, the
//! rightmost on a tie. The victim's whole chain is removed.
//!
//! Looking at two candidates keeps each pass linear in the number of entries
//! with no ordering structure to maintain on insert.

use tracing::debug;

use crate::cache::memory::MemoryStore;
use crate::cache::timeline::FrameRange;
use crate::cache::types::{CacheKey, PassType};

/// Inputs the recycler needs from outside the store.
#[derive(Debug, Clone, Copy)]
pub struct RecycleContext {
    /// Frame under the playback cursor
    pub playback_frame: f32,
    /// Frames the running prefetch job is producing
    pub protected: Option<FrameRange>,
}

impl RecycleContext {
    pub fn new(playback_frame: f32) -> Self {
        Self {
            playback_frame,
            protected: None,
        }
    }

    pub fn with_protected(mut self, range: Option<FrameRange>) -> Self {
        self.protected = range;
        self
    }
}

/// Result of a recycle run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecycleResult {
    /// Chains removed
    pub chains_removed: usize,
    /// Entries removed across all chains
    pub items_removed: usize,
    /// Store is within budget after the run
    pub within_budget: bool,
}

/// Leftmost and rightmost chain terminals by timeline frame.
///
/// Terminals are non-temp entries without a successor. Thumbnails are
/// managed separately and never returned.
pub fn extreme_terminals(store: &MemoryStore) -> Option<(CacheKey, CacheKey)> {
    let mut extremes: Option<(CacheKey, CacheKey)> = None;

    for (key, entry) in store.iter() {
        if entry.is_temp() || entry.link_next().is_some() || key.pass == PassType::Thumbnail {
            continue;
        }
        extremes = Some(match extremes {
            None => (*key, *key),
            Some((left, right)) => {
                let left = if key.timeline_frame < left.timeline_frame { *key } else { left };
                let right = if key.timeline_frame > right.timeline_frame { *key } else { right };
                (left, right)
            }
        });
    }

    extremes
}

/// Pick which of the two candidates to evict, if either.
pub fn choose_victim(left: CacheKey, right: CacheKey, context: &RecycleContext) -> Option<CacheKey> {
    if let Some(range) = context.protected {
        if !range.contains(left.timeline_frame) {
            return Some(left);
        }
        if !range.contains(right.timeline_frame) {
            return Some(right);
        }
        return None;
    }

    let (left, right) = if left.timeline_frame > right.timeline_frame {
        (right, left)
    } else {
        (left, right)
    };

    let left_distance = context.playback_frame - left.timeline_frame;
    let right_distance = right.timeline_frame - context.playback_frame;

    if left_distance > right_distance {
        Some(left)
    } else {
        Some(right)
    }
}

/// Remove chains until the store fits its budget or nothing is evictable.
pub fn recycle(store: &mut MemoryStore, context: &RecycleContext) -> RecycleResult {
    let mut result = RecycleResult::default();

    while store.is_over_budget() {
        let Some((left, right)) = extreme_terminals(store) else {
            break;
        };
        let Some(victim) = choose_victim(left, right, context) else {
            debug!(
                playback = context.playback_frame,
                "All recycle candidates are protected by prefetch"
            );
            break;
        };

        let removed = store.remove_chain(&victim);
        if removed == 0 {
            break;
        }
        debug!(
            strip = victim.strip.0,
            timeline_frame = victim.timeline_frame,
            pass = %victim.pass,
            removed,
            "Recycled cache chain"
        );
        result.chains_removed += 1;
        result.items_removed += removed;
    }

    result.within_budget = !store.is_over_budget();
    result
}
