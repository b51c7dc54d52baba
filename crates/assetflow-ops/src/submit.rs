//! Turning selections into backend operations.

use std::sync::Arc;

use chrono::Utc;
use itertools::Itertools;

use assetflow_select::SelectionEngine;

use crate::backend::AssetBackend;
use crate::error::SubmissionError;
use crate::operation::{BulkOperation, BulkOperationRequest, OperationOptions};

/// Submits bulk operations to the backend.
///
/// Submission only enqueues: it returns once the backend has handed out an
/// operation id. Requests that are empty after de-duplication, or whose
/// options cannot apply, are rejected before any backend call.
#[derive(Debug, Clone)]
pub struct OperationSubmitter {
    backend: Arc<dyn AssetBackend>,
}

impl OperationSubmitter {
    /// Create a submitter talking to `backend`.
    pub fn new(backend: Arc<dyn AssetBackend>) -> Self {
        Self { backend }
    }

    /// Apply the local checks without calling the backend.
    ///
    /// Returns the request with duplicate ids removed.
    pub fn prepare(request: BulkOperationRequest) -> Result<BulkOperationRequest, SubmissionError> {
        let asset_ids: Vec<_> = request.asset_ids.into_iter().unique().collect();
        if asset_ids.is_empty() {
            return Err(SubmissionError::EmptySelection);
        }

        request
            .options
            .validate(&asset_ids)
            .map_err(|message| SubmissionError::InvalidOptions { message })?;
        Ok(BulkOperationRequest::new(asset_ids, request.options))
    }

    /// Submit an explicit request.
    pub async fn submit(
        &self,
        request: BulkOperationRequest,
    ) -> Result<BulkOperation, SubmissionError> {
        let BulkOperationRequest { asset_ids, options } = Self::prepare(request)?;

        let operation_type = options.operation_type();
        let id = self
            .backend
            .submit_operation(&asset_ids, &options)
            .await
            .inspect_err(|e| {
                tracing::warn!(%operation_type, count = asset_ids.len(), error = %e, "submission failed");
            })?;

        tracing::info!(operation = %id, %operation_type, count = asset_ids.len(), "operation submitted");

        Ok(BulkOperation {
            id,
            operation_type,
            asset_ids,
            options,
            created_at: Utc::now(),
        })
    }

    /// Submit an operation over the current selection.
    ///
    /// On success the selection is cleared; on failure it is left untouched.
    pub async fn submit_selection(
        &self,
        selection: &mut SelectionEngine,
        options: OperationOptions,
    ) -> Result<BulkOperation, SubmissionError> {
        let request = BulkOperationRequest::new(selection.selected_assets(), options);
        let operation = self.submit(request).await?;
        selection.select_none();
        Ok(operation)
    }
}
