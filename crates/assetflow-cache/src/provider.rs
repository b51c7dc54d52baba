//! Hierarchy provider boundary used to fill the cache.

use async_trait::async_trait;
use thiserror::Error;

use assetflow_core::{AssetId, TreeNode};

/// Failure to load a node from the hierarchy provider.
#[derive(Debug, Clone, Error)]
#[error("Failed to load asset {id}: {message}")]
pub struct LoadError {
    /// The asset that could not be loaded.
    pub id: AssetId,
    /// Provider-supplied reason.
    pub message: String,
}

impl LoadError {
    /// Create a new load error.
    pub fn new(id: AssetId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

/// Source of hierarchy data for preloading and warming.
#[async_trait]
pub trait HierarchyProvider: Send + Sync {
    /// Load a single node.
    async fn load_node(&self, id: AssetId) -> Result<TreeNode, LoadError>;

    /// Load the breadcrumb path from the root down to `id` (inclusive).
    async fn load_path(&self, id: AssetId) -> Result<Vec<TreeNode>, LoadError>;

    /// Load the direct children of a folder.
    async fn load_children(&self, id: AssetId) -> Result<Vec<TreeNode>, LoadError>;
}

impl std::fmt::Debug for dyn HierarchyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HierarchyProvider")
    }
}
