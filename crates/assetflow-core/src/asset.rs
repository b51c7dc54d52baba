//! Asset identifiers and hierarchy nodes.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a node in an asset hierarchy.
///
/// Ids are positive integers handed out by the hierarchy provider. The
/// client never interprets them beyond equality and hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl AssetId {
    /// Create a new AssetId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of node in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// A folder that may contain other assets.
    Folder,
    /// A leaf device or configuration item.
    #[default]
    Device,
}

/// A node of the asset hierarchy as returned by the hierarchy provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Identifier of this node.
    pub id: AssetId,
    /// Display name.
    pub name: CompactString,
    /// Parent folder (None for roots).
    #[serde(default)]
    pub parent_id: Option<AssetId>,
    /// Folder or device.
    #[serde(default)]
    pub kind: AssetKind,
    /// Classification label, if the asset has been classified.
    #[serde(default)]
    pub classification: Option<CompactString>,
    /// Whether the node is protected from deletion.
    #[serde(default)]
    pub protected: bool,
    /// Number of direct children (folders only).
    #[serde(default)]
    pub child_count: usize,
}

impl TreeNode {
    /// Create a folder node.
    pub fn folder(id: AssetId, name: impl Into<CompactString>, parent_id: Option<AssetId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            kind: AssetKind::Folder,
            classification: None,
            protected: false,
            child_count: 0,
        }
    }

    /// Create a device (leaf) node.
    pub fn device(id: AssetId, name: impl Into<CompactString>, parent_id: Option<AssetId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            kind: AssetKind::Device,
            classification: None,
            protected: false,
            child_count: 0,
        }
    }

    /// Set the classification.
    pub fn with_classification(mut self, classification: impl Into<CompactString>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Set the number of direct children.
    pub fn with_child_count(mut self, count: usize) -> Self {
        self.child_count = count;
        self
    }

    /// Check if this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == AssetKind::Folder
    }

    /// Check if this node has children worth loading.
    pub fn has_children(&self) -> bool {
        self.is_folder() && self.child_count > 0
    }
}
