//! Integration tests for concurrent cache access.
//!
//! Render threads share one `SequencerCache` behind an `Arc`. These tests
//! verify that concurrent puts, gets and invalidations leave the cache
//! consistent and that racing duplicate puts keep exactly one buffer.
//!
//! Run with: `cargo test --test concurrency_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use seqcache::cache::{
    CacheConfig, FrameBuffer, MemoryTimeline, NoPrefetch, PassType, PassTypeSet, PixelFormat,
    RenderContext, RenderData, SceneDescriptor, SceneId, SequencerCache, StripId, StripInfo,
};
use seqcache::log::NoOpLogger;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const SIDE: u32 = 4;
const ITEM: usize = (SIDE * SIDE * 4) as usize;
const THREADS: usize = 8;

fn data() -> RenderData {
    RenderData::new(RenderContext::new(SceneId(1), SIDE, SIDE))
}

fn clip() -> StripInfo {
    StripInfo::media(StripId(1), "clip", 1, 0, 1000)
}

fn shared_cache(config: CacheConfig) -> Arc<SequencerCache> {
    let timeline = Arc::new(MemoryTimeline::new());
    timeline.insert(clip());
    let scene = SceneDescriptor::new(SceneId(1), "project", "Scene").with_session_timestamp(5);
    Arc::new(
        SequencerCache::new(
            config,
            scene,
            timeline,
            Arc::new(NoPrefetch),
            Arc::new(NoOpLogger),
        )
        .unwrap(),
    )
}

// =============================================================================
// Concurrent Access
// =============================================================================

#[test]
fn test_parallel_puts_on_distinct_frames() {
    let cache = shared_cache(CacheConfig::default());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50 {
                    let f = (t * 100 + i) as f32;
                    let buffer = FrameBuffer::filled(SIDE, SIDE, PixelFormat::Rgba8, t as u8);
                    assert!(cache.put(&data(), &clip(), f, PassType::Raw, buffer));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), THREADS * 50);
    assert_eq!(cache.size_bytes(), THREADS * 50 * ITEM);
    for t in 0..THREADS {
        let hit = cache
            .get(&data(), &clip(), (t * 100) as f32, PassType::Raw)
            .unwrap();
        assert_eq!(hit.pixels()[0], t as u8);
    }
}

#[test]
fn test_racing_duplicate_puts_keep_one_buffer() {
    let cache = shared_cache(CacheConfig::default());
    let barrier = Arc::new(Barrier::new(THREADS));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                let buffer = FrameBuffer::filled(SIDE, SIDE, PixelFormat::Rgba8, t as u8);
                barrier.wait();
                if cache.put(&data(), &clip(), 10.0, PassType::FinalOut, buffer) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_readers_and_writers_under_budget_pressure() {
    let budget = 64 * ITEM;
    let cache = shared_cache(
        CacheConfig::default()
            .with_stored_types(PassTypeSet::all())
            .with_memory_size(budget),
    );

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    let f = (t * 200 + i) as f32;
                    for pass in [PassType::Raw, PassType::Composite, PassType::FinalOut] {
                        let buffer = FrameBuffer::filled(SIDE, SIDE, PixelFormat::Rgba8, 1);
                        cache.put(&data(), &clip(), f, pass, buffer);
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut hits = 0usize;
                for i in 0..100 {
                    let f = (t * 200 + i) as f32;
                    if let Some(buffer) = cache.get(&data(), &clip(), f, PassType::FinalOut) {
                        assert_eq!(buffer.size_bytes(), ITEM);
                        hits += 1;
                    }
                }
                hits
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    for handle in readers {
        handle.join().unwrap();
    }

    // Each writer can overshoot by at most the item it is inserting.
    assert!(cache.size_bytes() <= budget + 4 * ITEM);
    let stats = cache.stats().stats;
    assert!(stats.chains_recycled > 0);
}

#[test]
fn test_invalidation_races_with_puts() {
    let cache = shared_cache(CacheConfig::default());
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..200 {
                let buffer = FrameBuffer::filled(SIDE, SIDE, PixelFormat::Rgba8, 1);
                cache.put(&data(), &clip(), i as f32, PassType::Raw, buffer);
            }
        })
    };
    let invalidator = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..20 {
                cache.invalidate_raw(StripId(1));
            }
        })
    };
    writer.join().unwrap();
    invalidator.join().unwrap();

    // Whatever survived must be internally consistent.
    assert_eq!(cache.size_bytes(), cache.len() * ITEM);
    cache.invalidate_raw(StripId(1));
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_disk_writes_to_one_block() {
    let temp = TempDir::new().unwrap();
    let cache = shared_cache(
        CacheConfig::default().with_disk_root(temp.path().to_path_buf()),
    );

    // Frames 0..80 share block file 0 for FINAL_OUT.
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..20 {
                    let f = (t * 20 + i) as f32;
                    let buffer = FrameBuffer::filled(SIDE, SIDE, PixelFormat::Rgba8, f as u8);
                    cache.put(&data(), &clip(), f, PassType::FinalOut, buffer);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    cache.cleanup();
    for f in 0..80 {
        let restored = cache
            .get(&data(), &clip(), f as f32, PassType::FinalOut)
            .unwrap_or_else(|| panic!("frame {} missing from disk", f));
        assert_eq!(restored.pixels()[0], f as u8);
    }
    assert_eq!(cache.stats().stats.disk_file_count, 1);
}
