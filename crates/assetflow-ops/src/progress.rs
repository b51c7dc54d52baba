//! Progress reporting types for bulk operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use assetflow_core::AssetId;

use crate::operation::{BulkOperation, OperationId, OperationType};

/// Lifecycle state of a bulk operation.
///
/// `pending → validating → processing → {completed | failed | cancelled}`;
/// `pending` and `validating` may go straight to `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Validating,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A per-asset error reported by the backend.
///
/// Blocking errors come from validation and stop the whole operation.
/// Non-blocking errors come from processing and mark one skipped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationItemError {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub error_message: String,
    pub blocking: bool,
}

impl OperationItemError {
    /// Create a validation (blocking) error.
    pub fn blocking(
        asset_id: AssetId,
        asset_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            asset_id,
            asset_name: asset_name.into(),
            error_message: message.into(),
            blocking: true,
        }
    }

    /// Create a processing (skipped item) error.
    pub fn item(asset_id: AssetId, asset_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            asset_id,
            asset_name: asset_name.into(),
            error_message: message.into(),
            blocking: false,
        }
    }
}

impl std::fmt::Display for OperationItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.asset_name, self.asset_id, self.error_message)
    }
}

/// Snapshot of an operation's progress as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperationProgress {
    pub operation_id: OperationId,
    pub status: OperationStatus,
    pub total_items: u64,
    pub processed_items: u64,
    pub failed_items: u64,
    /// Label of the item currently being processed.
    #[serde(default)]
    pub current_item: Option<String>,
    /// Items per second, 0 when not processing.
    #[serde(default)]
    pub processing_rate: f64,
    /// Only present while processing.
    #[serde(default)]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<OperationItemError>,
}

impl BulkOperationProgress {
    /// Create a pending snapshot.
    pub fn pending(operation_id: OperationId, total_items: u64) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Pending,
            total_items,
            processed_items: 0,
            failed_items: 0,
            current_item: None,
            processing_rate: 0.0,
            estimated_completion: None,
            errors: Vec::new(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the processed and failed counters.
    pub fn with_counts(mut self, processed_items: u64, failed_items: u64) -> Self {
        self.processed_items = processed_items;
        self.failed_items = failed_items;
        self
    }

    /// Append an error.
    pub fn with_error(mut self, error: OperationItemError) -> Self {
        self.errors.push(error);
        self
    }

    /// Whether the operation has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_items > 0 {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        } else if self.status == OperationStatus::Completed {
            100.0
        } else {
            0.0
        }
    }

    /// Items processed without error.
    pub fn succeeded_items(&self) -> u64 {
        self.processed_items.saturating_sub(self.failed_items)
    }

    /// Non-blocking errors (skipped items).
    pub fn item_errors(&self) -> impl Iterator<Item = &OperationItemError> {
        self.errors.iter().filter(|e| !e.blocking)
    }

    /// Blocking validation errors.
    pub fn blocking_errors(&self) -> impl Iterator<Item = &OperationItemError> {
        self.errors.iter().filter(|e| e.blocking)
    }

    /// Enforce counter invariants and the partial-success policy.
    ///
    /// - `processed ≤ total` and `failed ≤ processed` are clamped.
    /// - A processing snapshot with every item processed is completed, even
    ///   when some items failed.
    /// - Rate and estimate are dropped outside of processing.
    pub fn normalized(mut self) -> Self {
        if self.processed_items > self.total_items || self.failed_items > self.processed_items {
            tracing::warn!(
                operation = %self.operation_id,
                total = self.total_items,
                processed = self.processed_items,
                failed = self.failed_items,
                "inconsistent progress counters, clamping"
            );
            self.processed_items = self.processed_items.min(self.total_items);
            self.failed_items = self.failed_items.min(self.processed_items);
        }

        if self.status == OperationStatus::Processing
            && self.total_items > 0
            && self.processed_items == self.total_items
        {
            self.status = OperationStatus::Completed;
        }

        if self.status != OperationStatus::Processing {
            self.processing_rate = 0.0;
            self.estimated_completion = None;
            self.current_item = None;
        } else if !self.processing_rate.is_finite() || self.processing_rate < 0.0 {
            self.processing_rate = 0.0;
        }

        self
    }
}

/// Final result of a tracked operation, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    /// Last status observed.
    pub status: OperationStatus,
    /// True when tracking stopped before a terminal status was observed.
    pub detached: bool,
    pub total_items: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Skipped items, surfaced once the operation completed.
    pub item_errors: Vec<OperationItemError>,
    /// Validation errors that prevented any mutation.
    pub blocking_errors: Vec<OperationItemError>,
    /// History entry recorded for this operation, if any.
    pub history_entry: Option<u64>,
}

impl OperationReport {
    /// Build a report from the last progress snapshot.
    pub fn new(
        operation: &BulkOperation,
        last: Option<&BulkOperationProgress>,
        detached: bool,
    ) -> Self {
        match last {
            Some(progress) => Self {
                operation_id: operation.id.clone(),
                operation_type: operation.operation_type,
                status: progress.status,
                detached,
                total_items: progress.total_items,
                succeeded: progress.succeeded_items(),
                failed: progress.failed_items,
                item_errors: progress.item_errors().cloned().collect(),
                blocking_errors: progress.blocking_errors().cloned().collect(),
                history_entry: None,
            },
            None => Self {
                operation_id: operation.id.clone(),
                operation_type: operation.operation_type,
                status: OperationStatus::Pending,
                detached,
                total_items: operation.asset_ids.len() as u64,
                succeeded: 0,
                failed: 0,
                item_errors: Vec::new(),
                blocking_errors: Vec::new(),
                history_entry: None,
            },
        }
    }

    /// Whether the operation completed with no skipped items.
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Completed && self.failed == 0
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let action = self.operation_type.past_tense();
        match self.status {
            OperationStatus::Completed if self.failed == 0 => {
                format!("{} {} items", action, self.succeeded)
            }
            OperationStatus::Completed => {
                format!("{} {} items, {} skipped", action, self.succeeded, self.failed)
            }
            OperationStatus::Failed => format!(
                "{} failed validation ({} errors), nothing changed",
                self.operation_type,
                self.blocking_errors.len()
            ),
            OperationStatus::Cancelled => format!(
                "{} cancelled after {} of {} items",
                self.operation_type, self.succeeded, self.total_items
            ),
            status => format!(
                "{} still {} ({} of {} items), no longer tracked",
                self.operation_type, status, self.succeeded, self.total_items
            ),
        }
    }
}
