//! The four-tier tree cache with invalidation, preloading and warming.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use assetflow_core::{AssetId, CacheConfig, TreeNode};

use crate::entry::CacheStats;
use crate::instance::TtlLruCache;
use crate::provider::HierarchyProvider;

/// Default number of concurrent loads per preload batch.
pub const DEFAULT_PRELOAD_BATCH: usize = 5;

/// Key under which a node is stored in the node tier.
pub fn node_key(id: AssetId) -> String {
    format!("node-{id}")
}

/// Normalize a search query for use as a cache key.
///
/// Returns None for empty or whitespace-only queries, which are never cached.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Per-tier counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub node: CacheStats,
    pub path: CacheStats,
    pub search: CacheStats,
    pub metadata: CacheStats,
}

impl TierStats {
    /// Sum over all tiers.
    pub fn total(&self) -> CacheStats {
        self.node + self.path + self.search + self.metadata
    }
}

/// Aggregate cache metrics for diagnostic display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Fraction of reads that hit (0.0 to 1.0).
    pub hit_rate: f64,
    /// Fraction of reads that missed (0.0 to 1.0).
    pub miss_rate: f64,
    /// Number of stored entries across all tiers.
    pub cache_size: usize,
    /// Number of LRU evictions across all tiers.
    pub eviction_count: u64,
    /// Mean time spent per read.
    pub average_access_time: Duration,
}

/// Outcome of a background preload or warm run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    /// Nodes written into the cache.
    pub loaded: usize,
    /// Ids skipped because they were already cached.
    pub skipped: usize,
    /// Loads that failed (logged and swallowed).
    pub failed: usize,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

/// Process-wide cache for hierarchy data, split into four independent tiers.
#[derive(Debug)]
pub struct TreeCache {
    nodes: TtlLruCache<String, TreeNode>,
    paths: TtlLruCache<AssetId, Vec<TreeNode>>,
    search: TtlLruCache<String, Vec<TreeNode>>,
    metadata: TtlLruCache<AssetId, Value>,
    batch_size: usize,
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl TreeCache {
    /// Create a cache with the given tier limits.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            nodes: TtlLruCache::new("node", config.node.max_size, config.node.ttl()),
            paths: TtlLruCache::new("path", config.path.max_size, config.path.ttl()),
            search: TtlLruCache::new("search", config.search.max_size, config.search.ttl()),
            metadata: TtlLruCache::new("metadata", config.metadata.max_size, config.metadata.ttl()),
            batch_size: DEFAULT_PRELOAD_BATCH,
        }
    }

    /// Set the number of concurrent loads per preload batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    // Node tier

    /// Get a cached node.
    pub fn get_node(&mut self, id: AssetId) -> Option<TreeNode> {
        self.nodes.get(&node_key(id)).cloned()
    }

    /// Cache a node under its own id.
    pub fn set_node(&mut self, node: TreeNode) {
        self.nodes.set(node_key(node.id), node);
    }

    /// Check for a fresh node without affecting statistics.
    pub fn has_node(&self, id: AssetId) -> bool {
        self.nodes.contains_fresh(&node_key(id))
    }

    /// Peek at a fresh node without affecting statistics or recency.
    ///
    /// Entries past their TTL are treated as absent.
    pub fn peek_node(&self, id: AssetId) -> Option<&TreeNode> {
        self.nodes.peek_fresh(&node_key(id)).map(|e| &e.data)
    }

    // Path tier

    /// Get a cached breadcrumb path.
    pub fn get_path(&mut self, id: AssetId) -> Option<Vec<TreeNode>> {
        self.paths.get(&id).cloned()
    }

    /// Cache a breadcrumb path.
    pub fn set_path(&mut self, id: AssetId, path: Vec<TreeNode>) {
        self.paths.set(id, path);
    }

    // Search tier

    /// Get cached results for a query. Blank queries always return None.
    pub fn get_search(&mut self, query: &str) -> Option<Vec<TreeNode>> {
        let key = normalize_query(query)?;
        self.search.get(&key).cloned()
    }

    /// Cache results for a query. Blank queries are ignored.
    pub fn set_search(&mut self, query: &str, results: Vec<TreeNode>) {
        if let Some(key) = normalize_query(query) {
            self.search.set(key, results);
        }
    }

    // Metadata tier

    /// Get cached metadata for a node.
    pub fn get_metadata(&mut self, id: AssetId) -> Option<Value> {
        self.metadata.get(&id).cloned()
    }

    /// Cache metadata for a node.
    pub fn set_metadata(&mut self, id: AssetId, metadata: Value) {
        self.metadata.set(id, metadata);
    }

    // Invalidation

    /// Drop the node, path and metadata entries for one id.
    ///
    /// Children and search results are left untouched.
    pub fn invalidate_node(&mut self, id: AssetId) {
        self.nodes.delete(&node_key(id));
        self.paths.delete(&id);
        self.metadata.delete(&id);
    }

    /// Drop every cached search result.
    pub fn invalidate_search_cache(&mut self) {
        self.search.clear();
    }

    /// Drop everything.
    pub fn invalidate_all(&mut self) {
        self.nodes.clear();
        self.paths.clear();
        self.search.clear();
        self.metadata.clear();
    }

    // Statistics

    /// Counters for each tier.
    pub fn tier_stats(&self) -> TierStats {
        TierStats {
            node: self.nodes.stats(),
            path: self.paths.stats(),
            search: self.search.stats(),
            metadata: self.metadata.stats(),
        }
    }

    /// Aggregate metrics across all tiers.
    pub fn metrics(&self) -> CacheMetrics {
        let total = self.tier_stats().total();
        let lookups = total.lookups();
        let access_time = self.nodes.total_access_time()
            + self.paths.total_access_time()
            + self.search.total_access_time()
            + self.metadata.total_access_time();

        let (hit_rate, miss_rate, average_access_time) = if lookups == 0 {
            (0.0, 0.0, Duration::ZERO)
        } else {
            (
                total.hit_count as f64 / lookups as f64,
                total.miss_count as f64 / lookups as f64,
                access_time / lookups.min(u32::MAX as u64) as u32,
            )
        };

        CacheMetrics {
            hit_rate,
            miss_rate,
            cache_size: total.size,
            eviction_count: total.eviction_count,
            average_access_time,
        }
    }

    // Background fill

    /// Breadth-first load of children below `roots`, `depth` levels deep.
    ///
    /// Loads run in batches of concurrent requests, yielding between
    /// batches. A failed load is logged and skipped; its subtree is not
    /// descended into. Cancellation is checked before each batch.
    pub async fn preload_nodes<P>(
        &mut self,
        provider: &P,
        roots: &[AssetId],
        depth: usize,
        cancel: &CancellationToken,
    ) -> PreloadReport
    where
        P: HierarchyProvider + ?Sized,
    {
        let mut report = PreloadReport::default();
        let mut frontier: Vec<AssetId> = roots.to_vec();

        for level in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_level = Vec::new();

            for batch in frontier.chunks(self.batch_size) {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }

                let results = join_all(batch.iter().map(|&id| provider.load_children(id))).await;

                for (&parent, result) in batch.iter().zip(results) {
                    match result {
                        Ok(children) => {
                            for child in children {
                                if child.has_children() {
                                    next_level.push(child.id);
                                }
                                self.set_node(child);
                                report.loaded += 1;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(%parent, level, error = %e, "preload failed");
                            report.failed += 1;
                        }
                    }
                }

                tokio::task::yield_now().await;
            }

            frontier = next_level;
        }

        tracing::debug!(
            loaded = report.loaded,
            failed = report.failed,
            "preload finished"
        );
        report
    }

    /// Eagerly populate node and path tiers for frequently used ids.
    ///
    /// Ids whose node is already cached are skipped. Failures are logged
    /// and do not stop the remaining work.
    pub async fn warm_cache<P>(
        &mut self,
        provider: &P,
        ids: &[AssetId],
        cancel: &CancellationToken,
    ) -> PreloadReport
    where
        P: HierarchyProvider + ?Sized,
    {
        let mut report = PreloadReport::default();
        let pending: Vec<AssetId> = ids
            .iter()
            .copied()
            .filter(|&id| {
                let cached = self.has_node(id);
                if cached {
                    report.skipped += 1;
                }
                !cached
            })
            .collect();

        for batch in pending.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return report;
            }

            let results = join_all(batch.iter().map(|&id| async move {
                let node = provider.load_node(id).await;
                let path = provider.load_path(id).await;
                (id, node, path)
            }))
            .await;

            for (id, node, path) in results {
                match (node, path) {
                    (Ok(node), Ok(path)) => {
                        self.set_node(node);
                        self.set_path(id, path);
                        report.loaded += 1;
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::warn!(%id, error = %e, "cache warm failed");
                        report.failed += 1;
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        report
    }
}
