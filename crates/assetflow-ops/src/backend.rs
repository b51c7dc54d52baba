//! Remote backend boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use assetflow_core::AssetId;

use crate::conflict::Conflict;
use crate::error::BackendError;
use crate::operation::{OperationId, OperationOptions};
use crate::progress::BulkOperationProgress;

/// The opaque remote service that executes bulk operations.
///
/// Execution is asynchronous on the backend side: `submit_operation`
/// returns as soon as the operation is enqueued, and progress is observed
/// by polling `get_operation_progress`.
#[async_trait]
pub trait AssetBackend: Send + Sync {
    /// Enqueue an operation and return its id.
    async fn submit_operation(
        &self,
        asset_ids: &[AssetId],
        options: &OperationOptions,
    ) -> Result<OperationId, BackendError>;

    /// Fetch the current progress of an operation.
    async fn get_operation_progress(
        &self,
        operation_id: &OperationId,
    ) -> Result<BulkOperationProgress, BackendError>;

    /// Ask the backend to stop an operation. Best effort.
    async fn cancel_operation(&self, operation_id: &OperationId) -> Result<(), BackendError>;

    /// Check whether the assets may be moved under `new_parent_id`.
    async fn validate_bulk_move(
        &self,
        asset_ids: &[AssetId],
        new_parent_id: AssetId,
    ) -> Result<ValidationResult, BackendError>;
}

impl std::fmt::Debug for dyn AssetBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AssetBackend")
    }
}

/// A validation message, optionally tied to one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub asset_id: Option<AssetId>,
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue for one asset.
    pub fn for_asset(asset_id: AssetId, message: impl Into<String>) -> Self {
        Self {
            asset_id: Some(asset_id),
            message: message.into(),
        }
    }
}

/// Outcome of a move validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
    #[serde(default)]
    pub warnings: Vec<ValidationIssue>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

impl ValidationResult {
    /// A passing result with no messages.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    /// Result for a drop of assets onto one of themselves, decided locally.
    pub fn self_move(target_id: AssetId) -> Self {
        Self {
            is_valid: false,
            errors: vec![ValidationIssue::for_asset(
                target_id,
                "Cannot move an asset into itself",
            )],
            warnings: Vec::new(),
            conflicts: vec![Conflict::target_is_descendant(target_id, target_id)],
        }
    }

    /// Whether every conflict could be resolved by skipping the item.
    pub fn conflicts_skippable(&self) -> bool {
        self.conflicts.iter().all(|c| c.kind.is_skippable())
    }
}
