//! Detection Cache Store
//!
//! Maps fingerprints to detection results with a fixed TTL and a size bound.
//! Every operation is total: a lookup either serves a fresh value or reports a
//! miss, an insert always succeeds.

use std::collections::HashMap;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, Fingerprint};

// == Detection Cache ==
/// Size-bounded TTL cache evicting the oldest insertion first.
#[derive(Debug)]
pub struct DetectionCache<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    stats: CacheStats,
    capacity: usize,
    ttl_ms: u64,
}

impl<V: Clone> DetectionCache<V> {
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of resident entries (at least 1)
    /// * `ttl_ms` - Maximum age in milliseconds at which an entry is served
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.max(1) + 1),
            stats: CacheStats::new(),
            capacity: capacity.max(1),
            ttl_ms,
        }
    }

    // == Lookup ==
    /// Returns the cached value for `fingerprint` if it is still fresh.
    pub fn lookup(&mut self, fingerprint: &Fingerprint) -> Option<V> {
        self.lookup_at(fingerprint, current_timestamp_ms())
    }

    /// Lookup against an explicit clock reading (Unix milliseconds).
    ///
    /// Expired entries are dropped on the way out; absent and expired are both
    /// reported as a plain miss.
    pub fn lookup_at(&mut self, fingerprint: &Fingerprint, now: u64) -> Option<V> {
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if !entry.is_expired_at(now, self.ttl_ms) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(fingerprint);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        self.stats.record_miss();
        None
    }

    // == Insert ==
    /// Stores `value` under `fingerprint`, stamped with the current time.
    pub fn insert(&mut self, fingerprint: Fingerprint, value: V) {
        self.insert_at(fingerprint, value, current_timestamp_ms());
    }

    /// Insert against an explicit clock reading (Unix milliseconds).
    ///
    /// Overwriting an existing fingerprint resets its timestamp. When the
    /// resulting size exceeds the capacity, the entry with the smallest
    /// insertion time is evicted.
    pub fn insert_at(&mut self, fingerprint: Fingerprint, value: V, now: u64) {
        self.entries.insert(fingerprint, CacheEntry::new(value, now));

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.oldest_fingerprint() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
                tracing::debug!("Evicted oldest detection result {}", oldest);
            }
        }

        self.stats.set_total_entries(self.entries.len());
    }

    // == Clear ==
    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Purge Expired ==
    /// Removes every entry that can no longer be served.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(current_timestamp_ms())
    }

    pub fn purge_expired_at(&mut self, now: u64) -> usize {
        let ttl_ms = self.ttl_ms;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now, ttl_ms));
        let removed = before - self.entries.len();

        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    fn oldest_fingerprint(&self) -> Option<Fingerprint> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(fingerprint, _)| fingerprint.clone())
    }

    // == Accessors ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }
}
