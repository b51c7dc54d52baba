//! Cache entry bookkeeping.

use std::mem;

use serde::Serialize;
use tokio::time::Instant;

/// A cached value with access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub data: T,
    /// When the value was written.
    pub timestamp: Instant,
    /// Number of reads that returned this entry.
    pub access_count: u64,
    /// When the entry was last written or read.
    pub last_accessed: Instant,
    /// Rough size of the value in bytes.
    pub size_estimate: usize,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(data: T, now: Instant) -> Self {
        Self {
            data,
            timestamp: now,
            access_count: 0,
            last_accessed: now,
            size_estimate: mem::size_of::<T>(),
        }
    }

    /// Check whether the entry is at least `ttl` old at `now`.
    pub fn is_expired(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.saturating_duration_since(self.timestamp) >= ttl
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

/// Counters for a single cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of live entries (expired entries not yet read still count).
    pub size: usize,
    /// Reads that returned a value.
    pub hit_count: u64,
    /// Reads that found nothing or an expired entry.
    pub miss_count: u64,
    /// Entries removed to make room.
    pub eviction_count: u64,
}

impl CacheStats {
    /// Total number of reads.
    pub fn lookups(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    /// Fraction of reads that hit, 0.0 when nothing was read.
    pub fn hit_rate(&self) -> f64 {
        if self.lookups() == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.lookups() as f64
        }
    }
}

impl std::ops::Add for CacheStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            size: self.size + rhs.size,
            hit_count: self.hit_count + rhs.hit_count,
            miss_count: self.miss_count + rhs.miss_count,
            eviction_count: self.eviction_count + rhs.eviction_count,
        }
    }
}
