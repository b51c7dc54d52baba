//! Conflicts reported by move validation.

use serde::{Deserialize, Serialize};

use assetflow_core::AssetId;

/// A conflict detected while validating a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The asset being moved.
    pub asset_id: AssetId,
    /// The destination folder.
    pub target_id: AssetId,
    /// The kind of conflict.
    pub kind: ConflictKind,
}

impl Conflict {
    /// Create a new conflict.
    pub fn new(asset_id: AssetId, target_id: AssetId, kind: ConflictKind) -> Self {
        Self {
            asset_id,
            target_id,
            kind,
        }
    }

    /// Create a target-is-descendant conflict.
    pub fn target_is_descendant(asset_id: AssetId, target_id: AssetId) -> Self {
        Self::new(asset_id, target_id, ConflictKind::TargetIsDescendant)
    }

    /// Create a name-exists conflict.
    pub fn name_exists(asset_id: AssetId, target_id: AssetId) -> Self {
        Self::new(asset_id, target_id, ConflictKind::NameExists)
    }
}

/// The kind of conflict encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// An asset with the same name already exists under the target.
    NameExists,
    /// Cannot move a folder into itself or one of its descendants.
    TargetIsDescendant,
    /// The asset already lives under the target.
    SameParent,
    /// The asset is protected.
    Protected,
    /// Permission denied.
    PermissionDenied,
}

impl ConflictKind {
    /// Whether skipping the item resolves the conflict.
    ///
    /// A move into the asset's own subtree is never skippable; the whole
    /// request is malformed.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, Self::TargetIsDescendant)
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameExists => write!(f, "An asset with this name already exists"),
            Self::TargetIsDescendant => write!(f, "Cannot move a folder into itself"),
            Self::SameParent => write!(f, "Asset is already in this folder"),
            Self::Protected => write!(f, "Asset is protected"),
            Self::PermissionDenied => write!(f, "Permission denied"),
        }
    }
}
