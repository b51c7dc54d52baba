//! A single TTL + LRU cache instance.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::entry::{CacheEntry, CacheStats};

/// Bounded cache with lazy TTL expiration and least-recently-accessed eviction.
///
/// `access_count` is tracked for reporting only; eviction order depends
/// purely on recency.
#[derive(Debug)]
pub struct TtlLruCache<K: Hash + Eq, V> {
    name: &'static str,
    entries: LruCache<K, CacheEntry<V>>,
    ttl: Duration,
    stats: CacheStats,
    access_time: Duration,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
{
    /// Create a cache holding at most `max_size` entries for `ttl` each.
    pub fn new(name: &'static str, max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: LruCache::new(capacity),
            ttl,
            stats: CacheStats::default(),
            access_time: Duration::ZERO,
        }
    }

    /// Name used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of entries.
    pub fn max_size(&self) -> usize {
        self.entries.cap().get()
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a value, counting a hit or a miss.
    ///
    /// An entry whose age has reached the TTL is removed and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let started = std::time::Instant::now();
        let now = Instant::now();

        let expired = match self.entries.peek(key) {
            None => {
                self.stats.miss_count += 1;
                self.access_time += started.elapsed();
                return None;
            }
            Some(entry) => entry.is_expired(now, self.ttl),
        };

        if expired {
            self.entries.pop(key);
            self.stats.miss_count += 1;
            self.access_time += started.elapsed();
            tracing::debug!(cache = self.name, ?key, "expired entry dropped");
            return None;
        }

        self.stats.hit_count += 1;
        self.access_time += started.elapsed();
        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        Some(&entry.data)
    }

    /// Check for a fresh entry without touching statistics or recency.
    pub fn contains_fresh(&self, key: &K) -> bool {
        self.peek_fresh(key).is_some()
    }

    /// Peek at an entry without touching statistics or recency.
    ///
    /// Expired entries are still returned; see [`Self::peek_fresh`].
    pub fn peek_entry(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.peek(key)
    }

    /// Peek at an entry that has not reached its TTL.
    pub fn peek_fresh(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries
            .peek(key)
            .filter(|entry| !entry.is_expired(Instant::now(), self.ttl))
    }

    /// Insert or overwrite a value with a fresh timestamp.
    ///
    /// Inserting a new key into a full cache first evicts the least
    /// recently accessed entry.
    pub fn set(&mut self, key: K, value: V) {
        if !self.entries.contains(&key) && self.entries.len() >= self.max_size() {
            self.evict_lru();
        }
        self.entries.put(key, CacheEntry::new(value, Instant::now()));
    }

    fn evict_lru(&mut self) {
        if let Some((key, _)) = self.entries.pop_lru() {
            self.stats.eviction_count += 1;
            tracing::debug!(cache = self.name, ?key, "evicted least recently used entry");
        }
    }

    /// Remove an entry. Returns true if it was present.
    pub fn delete(&mut self, key: &K) -> bool {
        self.entries.pop(key).is_some()
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ..self.stats
        }
    }

    /// Total time spent in `get`.
    pub fn total_access_time(&self) -> Duration {
        self.access_time
    }

    /// Sum of the size estimates of all entries.
    pub fn estimated_bytes(&self) -> usize {
        self.entries.iter().map(|(_, e)| e.size_estimate).sum()
    }
}
