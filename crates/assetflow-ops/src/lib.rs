//! Bulk operation engine for assetflow.
//!
//! This crate turns a selection into backend operations, tracks their
//! progress through the `pending → validating → processing → terminal`
//! lifecycle by polling, keeps a bounded undo/redo history, and ties these
//! together with the selection engine and tree cache in an [`Orchestrator`].

mod backend;
mod conflict;
mod drop_validation;
mod error;
mod history;
mod invert;
mod operation;
mod orchestrator;
mod poller;
mod progress;
mod sim;
mod submit;

pub use backend::{AssetBackend, ValidationIssue, ValidationResult};
pub use conflict::{Conflict, ConflictKind};
pub use drop_validation::{DropValidator, DropVerdict};
pub use error::{BackendError, InversionError, SubmissionError, UndoError};
pub use history::{HistoryEntry, HistoryKind, HistoryManager, DEFAULT_HISTORY_CAPACITY};
pub use invert::{invert, replay, AssetSnapshot};
pub use operation::{
    BulkOperation, BulkOperationRequest, ClassifyOptions, DeleteOptions, ExportFormat,
    ExportOptions, MoveOptions, OperationId, OperationOptions, OperationType, RenameOptions,
};
pub use orchestrator::{Orchestrator, OperationOrigin, TrackedOperation};
pub use poller::{OperationTracker, PollOutcome, ProgressPoller};
pub use progress::{BulkOperationProgress, OperationItemError, OperationReport, OperationStatus};
pub use sim::{CallCounts, SimulatedBackend};
pub use submit::OperationSubmitter;
