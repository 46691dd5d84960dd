//! In-memory frame store with render-chain links.
//!
//! Entries produced while rendering one timeline frame (RAW, PREPROCESSED,
//! COMPOSITE, FINAL_OUT) are linked into a chain so they can be recycled
//! together. Links are stored as keys and resolved through the map on every
//! walk, so a removed neighbour simply stops the walk.
//!
//! `MemoryStore` has no interior locking. The facade keeps it behind the
//! per-scene lock and every method here runs under that lock.

use std::collections::HashMap;

use crate::cache::buffer::FrameBuffer;
use crate::cache::types::{CacheError, CacheKey, PassType};

/// Store-side bookkeeping for one cached buffer.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    buffer: FrameBuffer,
    task_id: u32,
    is_temp: bool,
    link_prev: Option<CacheKey>,
    link_next: Option<CacheKey>,
}

impl CacheEntry {
    fn new(buffer: FrameBuffer, task_id: u32, is_temp: bool) -> Self {
        Self {
            buffer,
            task_id,
            is_temp,
            link_prev: None,
            link_next: None,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Worker that produced the entry.
    pub fn task_id(&self) -> u32 {
        self.task_id
    }

    /// Temp entries are outside the chain model and freed opportunistically.
    pub fn is_temp(&self) -> bool {
        self.is_temp
    }

    pub fn link_prev(&self) -> Option<&CacheKey> {
        self.link_prev.as_ref()
    }

    pub fn link_next(&self) -> Option<&CacheKey> {
        self.link_next.as_ref()
    }
}

/// Hash map of cached frames plus the chain under construction.
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Most recently inserted non-temp key; the next insert links to it.
    last_key: Option<CacheKey>,
    size_bytes: usize,
    max_size_bytes: usize,
    thumbnail_count: usize,
}

impl MemoryStore {
    /// Create an empty store with the given memory budget.
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            last_key: None,
            size_bytes: 0,
            max_size_bytes,
            thumbnail_count: 0,
        }
    }

    /// New handle to the cached buffer.
    pub fn get(&self, key: &CacheKey) -> Option<FrameBuffer> {
        self.entries.get(key).map(|e| e.buffer.clone())
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert an entry, linking it onto the current chain unless it is temp.
    ///
    /// A FINAL_OUT insert closes the chain so the next insert starts a new
    /// one. Re-inserting an existing key is rejected; it would corrupt links.
    pub fn insert(
        &mut self,
        key: CacheKey,
        buffer: FrameBuffer,
        task_id: u32,
        is_temp: bool,
    ) -> Result<(), CacheError> {
        self.check_vacant(&key)?;
        let mut entry = CacheEntry::new(buffer, task_id, is_temp);

        if !is_temp && key.pass != PassType::Thumbnail {
            if let Some(last) = self.last_key {
                if let Some(prev) = self.entries.get_mut(&last) {
                    debug_assert!(
                        prev.link_next.is_none(),
                        "chain tail already has a successor"
                    );
                    prev.link_next = Some(key);
                    entry.link_prev = Some(last);
                }
            }
            self.last_key = match key.pass {
                PassType::FinalOut => None,
                _ => Some(key),
            };
        }

        self.store(key, entry);
        Ok(())
    }

    /// Insert an entry that takes no part in chain linking.
    ///
    /// Used for thumbnails and for buffers restored from disk.
    pub fn insert_unlinked(
        &mut self,
        key: CacheKey,
        buffer: FrameBuffer,
        task_id: u32,
        is_temp: bool,
    ) -> Result<(), CacheError> {
        self.check_vacant(&key)?;
        self.store(key, CacheEntry::new(buffer, task_id, is_temp));
        Ok(())
    }

    fn check_vacant(&self, key: &CacheKey) -> Result<(), CacheError> {
        if self.entries.contains_key(key) {
            return Err(CacheError::DuplicateKey {
                strip: key.strip,
                frame_index: key.frame_index,
                pass: key.pass,
            });
        }
        Ok(())
    }

    fn store(&mut self, key: CacheKey, entry: CacheEntry) {
        self.size_bytes += entry.buffer.size_bytes();
        if key.pass == PassType::Thumbnail {
            self.thumbnail_count += 1;
        }
        self.entries.insert(key, entry);
    }

    /// Remove one entry without touching its neighbours' links.
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.buffer.size_bytes());
        if key.pass == PassType::Thumbnail {
            self.thumbnail_count = self.thumbnail_count.saturating_sub(1);
        }
        if self.last_key.as_ref() == Some(key) {
            self.last_key = None;
        }
        Some(entry)
    }

    /// Splice an entry out of its chain, joining its neighbours.
    pub fn unlink(&mut self, key: &CacheKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let prev = entry.link_prev.take();
        let next = entry.link_next.take();

        if let Some(prev_key) = prev {
            if let Some(prev_entry) = self.entries.get_mut(&prev_key) {
                if prev_entry.link_next.as_ref() == Some(key) {
                    prev_entry.link_next = next;
                }
            }
        }
        if let Some(next_key) = next {
            if let Some(next_entry) = self.entries.get_mut(&next_key) {
                if next_entry.link_prev.as_ref() == Some(key) {
                    next_entry.link_prev = prev;
                }
            }
        }
        if self.last_key.as_ref() == Some(key) {
            self.last_key = prev;
        }
    }

    /// Unlink then remove every entry matching `predicate`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&CacheKey, &CacheEntry) -> bool) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(k, e)| predicate(k, e))
            .map(|(k, _)| *k)
            .collect();

        for key in &doomed {
            self.unlink(key);
            self.remove(key);
        }
        doomed.len()
    }

    /// Keys of the chain containing `base`, starting with `base`.
    ///
    /// Walks `link_prev` then `link_next` while the links agree in both
    /// directions. A link that disagrees has been taken over by another
    /// chain and ends the walk in that direction.
    pub fn chain_keys(&self, base: &CacheKey) -> Vec<CacheKey> {
        if !self.entries.contains_key(base) {
            return Vec::new();
        }
        let mut keys = vec![*base];

        let mut current = *base;
        while let Some(prev) = self.entries.get(&current).and_then(|e| e.link_prev) {
            match self.entries.get(&prev) {
                Some(p) if p.link_next == Some(current) => {}
                _ => break,
            }
            if keys.len() > self.entries.len() {
                debug_assert!(false, "cycle in cache chain");
                break;
            }
            keys.push(prev);
            current = prev;
        }

        let mut current = *base;
        while let Some(next) = self.entries.get(&current).and_then(|e| e.link_next) {
            match self.entries.get(&next) {
                Some(n) if n.link_prev == Some(current) => {}
                _ => break,
            }
            if keys.len() > self.entries.len() {
                debug_assert!(false, "cycle in cache chain");
                break;
            }
            keys.push(next);
            current = next;
        }

        keys
    }

    /// Remove the whole chain containing `base`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_chain(&mut self, base: &CacheKey) -> usize {
        let chain = self.chain_keys(base);
        for key in &chain {
            // Neighbours outside the consistent part of the chain must not
            // keep pointing at removed keys.
            self.unlink(key);
            self.remove(key);
        }
        chain.len()
    }

    /// Turn the chain containing `base` into temp entries.
    ///
    /// Temp entries are never chosen by the recycler and are dropped by the
    /// temp sweep instead. Clears the chain under construction.
    pub fn set_chain_temp(&mut self, base: &CacheKey) -> usize {
        let chain = self.chain_keys(base);
        for key in &chain {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.is_temp = true;
                entry.link_prev = None;
                entry.link_next = None;
            }
        }
        self.last_key = None;
        chain.len()
    }

    /// Key the next non-temp insert will link to.
    pub fn last_key(&self) -> Option<&CacheKey> {
        self.last_key.as_ref()
    }

    /// Start a fresh chain on the next insert.
    pub fn clear_last_key(&mut self) {
        self.last_key = None;
    }

    /// Drop temp entries of `task_id` for which `is_stale` holds.
    ///
    /// Thumbnails are never touched.
    pub fn free_temp(&mut self, task_id: u32, mut is_stale: impl FnMut(&CacheKey) -> bool) -> usize {
        self.remove_where(|key, entry| {
            entry.is_temp
                && entry.task_id == task_id
                && key.pass != PassType::Thumbnail
                && is_stale(key)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> {
        self.entries.iter()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_key = None;
        self.size_bytes = 0;
        self.thumbnail_count = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes held by all cached buffers.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn set_max_size_bytes(&mut self, max_size_bytes: usize) {
        self.max_size_bytes = max_size_bytes;
    }

    pub fn is_over_budget(&self) -> bool {
        self.size_bytes > self.max_size_bytes
    }

    /// Number of THUMBNAIL entries.
    pub fn thumbnail_count(&self) -> usize {
        self.thumbnail_count
    }
}
