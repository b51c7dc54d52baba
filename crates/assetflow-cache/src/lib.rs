//! Tiered cache for asset hierarchy data.
//!
//! Four independently sized TTL + LRU instances hold tree nodes,
//! breadcrumb paths, search results and per-node metadata. Expiration is
//! lazy: an expired entry is removed by the read that discovers it.

mod entry;
mod instance;
mod provider;
mod tiered;

pub use entry::{CacheEntry, CacheStats};
pub use instance::TtlLruCache;
pub use provider::{HierarchyProvider, LoadError};
pub use tiered::{
    node_key, normalize_query, CacheMetrics, PreloadReport, TierStats, TreeCache,
};
