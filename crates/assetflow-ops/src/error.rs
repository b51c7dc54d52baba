//! Error types for bulk operations.

use thiserror::Error;

use assetflow_core::AssetId;

use crate::operation::OperationId;
use crate::orchestrator::TrackedOperation;

/// Errors returned by the remote backend boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The call did not reach the backend or its reply was lost.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The backend does not know the operation.
    #[error("Unknown operation: {id}")]
    NotFound { id: OperationId },

    /// The backend refused the request.
    #[error("Rejected by backend: {message}")]
    Rejected { message: String },
}

impl BackendError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// An operation could not be created. Nothing was changed on either side.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// No assets left after de-duplication.
    #[error("No assets selected")]
    EmptySelection,

    /// The options cannot apply to these assets.
    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    /// The request never reached the backend.
    #[error("Failed to submit operation: {message}")]
    Transport { message: String },

    /// The backend refused to enqueue the operation.
    #[error("Operation rejected: {message}")]
    Rejected { message: String },
}

impl From<BackendError> for SubmissionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport { message } => Self::Transport { message },
            BackendError::Rejected { message } => Self::Rejected { message },
            BackendError::NotFound { id } => Self::Rejected {
                message: format!("unknown operation {id}"),
            },
        }
    }
}

/// A history entry cannot be turned into an inverse operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InversionError {
    /// The entry describes a change that cannot be reverted.
    #[error("Cannot undo: {reason}")]
    NotReversible { reason: String },

    /// The snapshot needed to revert an asset was not captured.
    #[error("No original state recorded for asset {asset_id}")]
    MissingOriginal { asset_id: AssetId },

    /// The recorded data does not have the expected shape.
    #[error("Malformed history data: {message}")]
    Malformed { message: String },
}

impl InversionError {
    pub(crate) fn not_reversible(reason: impl Into<String>) -> Self {
        Self::NotReversible {
            reason: reason.into(),
        }
    }
}

/// Undo or redo could not be started.
///
/// Only `Partial` leaves work running on the backend; in every other case
/// nothing was submitted.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The entry cannot be inverted or replayed. It was dropped from history.
    #[error(transparent)]
    Inversion(#[from] InversionError),

    /// No request was submitted. The history is left unchanged.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Some requests were accepted before one failed to submit.
    ///
    /// The entry has moved stacks as if the step succeeded; the accepted
    /// operations must still be completed by the caller.
    #[error("{} requests started, {remaining} not submitted: {error}", .started.len())]
    Partial {
        started: Vec<TrackedOperation>,
        /// Requests not submitted, including the one that failed.
        remaining: usize,
        error: SubmissionError,
    },
}
