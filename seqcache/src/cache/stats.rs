//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Counters for one scene cache.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory tier
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_size_bytes: usize,
    pub memory_entry_count: usize,
    pub items_recycled: u64,
    pub chains_recycled: u64,
    pub temp_freed: u64,
    pub thumbnails_evicted: u64,

    // Disk tier
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_size_bytes: u64,
    pub disk_file_count: usize,
    pub disk_writes: u64,
    pub disk_write_failures: u64,
    pub disk_files_evicted: u64,

    // Invalidation
    pub items_invalidated: u64,

    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_size_bytes: 0,
            memory_entry_count: 0,
            items_recycled: 0,
            chains_recycled: 0,
            temp_freed: 0,
            thumbnails_evicted: 0,
            disk_hits: 0,
            disk_misses: 0,
            disk_size_bytes: 0,
            disk_file_count: 0,
            disk_writes: 0,
            disk_write_failures: 0,
            disk_files_evicted: 0,
            items_invalidated: 0,
            created_at: Instant::now(),
        }
    }

    /// Memory hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Disk hit rate among memory misses that reached the disk (0.0 to 1.0).
    pub fn disk_hit_rate(&self) -> f64 {
        ratio(self.disk_hits, self.disk_hits + self.disk_misses)
    }

    /// Share of lookups served from either tier (0.0 to 1.0).
    pub fn overall_hit_rate(&self) -> f64 {
        ratio(self.memory_hits + self.disk_hits, self.memory_hits + self.memory_misses)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_disk_miss(&mut self) {
        self.disk_misses += 1;
    }

    /// Record chains removed by the recycler.
    pub fn record_recycle(&mut self, chains: usize, items: usize) {
        self.chains_recycled += chains as u64;
        self.items_recycled += items as u64;
    }

    pub fn record_temp_freed(&mut self, count: usize) {
        self.temp_freed += count as u64;
    }

    pub fn record_thumbnails_evicted(&mut self, count: usize) {
        self.thumbnails_evicted += count as u64;
    }

    pub fn record_invalidated(&mut self, count: usize) {
        self.items_invalidated += count as u64;
    }

    /// Record the outcome of a disk write.
    pub fn record_disk_write(&mut self, written: bool) {
        if written {
            self.disk_writes += 1;
        } else {
            self.disk_write_failures += 1;
        }
    }

    pub fn record_disk_eviction(&mut self, files: usize) {
        self.disk_files_evicted += files as u64;
    }

    pub fn update_memory_size(&mut self, size_bytes: usize, entry_count: usize) {
        self.memory_size_bytes = size_bytes;
        self.memory_entry_count = entry_count;
    }

    pub fn update_disk_size(&mut self, size_bytes: u64, file_count: usize) {
        self.disk_size_bytes = size_bytes;
        self.disk_file_count = file_count;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub disk_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
    pub uptime_secs: u64,
}

impl CacheStatistics {
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            disk_hit_rate_percent: stats.disk_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
            uptime_secs: stats.uptime().as_secs(),
        }
    }

    /// Human-readable report.
    pub fn format(&self, scene: &str) -> String {
        let stats = &self.stats;

        format!(
            r#"Frame Cache Statistics
Scene: {}

MEMORY
  Entries:     {}
  Size:        {:.2} MB
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Recycled:    {} items in {} chains
  Temp Freed:  {}
  Thumbnails:  {} evicted

DISK
  Files:       {}
  Size:        {:.2} GB
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Failures:    {}
  Evicted:     {} files

OVERALL
  Hit Rate:    {:.1}%
  Invalidated: {}
  Uptime:      {}s
"#,
            scene,
            stats.memory_entry_count,
            stats.memory_size_bytes as f64 / (1024.0 * 1024.0),
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.items_recycled,
            stats.chains_recycled,
            stats.temp_freed,
            stats.thumbnails_evicted,
            stats.disk_file_count,
            stats.disk_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
            stats.disk_hits,
            stats.disk_misses,
            self.disk_hit_rate_percent,
            stats.disk_writes,
            stats.disk_write_failures,
            stats.disk_files_evicted,
            self.overall_hit_rate_percent,
            stats.items_invalidated,
            self.uptime_secs,
        )
    }
}
