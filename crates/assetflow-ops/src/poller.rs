//! Progress polling for submitted operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use assetflow_core::OrchestratorConfig;

use crate::backend::AssetBackend;
use crate::error::BackendError;
use crate::operation::OperationId;
use crate::progress::BulkOperationProgress;

/// How tracking of an operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A terminal status was observed.
    Finished(BulkOperationProgress),
    /// The progress view was closed or the tracker dropped.
    Closed(Option<BulkOperationProgress>),
    /// Cancellation was requested and the follow-up poll was not terminal.
    CancelPending(Option<BulkOperationProgress>),
    /// Too many consecutive polls failed.
    Lost {
        last: Option<BulkOperationProgress>,
        message: String,
    },
}

impl PollOutcome {
    /// The last progress snapshot seen, if any.
    pub fn last_progress(&self) -> Option<&BulkOperationProgress> {
        match self {
            Self::Finished(progress) => Some(progress),
            Self::Closed(last) | Self::CancelPending(last) | Self::Lost { last, .. } => {
                last.as_ref()
            }
        }
    }

    /// Whether a terminal status was observed.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Starts one polling task per tracked operation.
#[derive(Debug, Clone)]
pub struct ProgressPoller {
    backend: Arc<dyn AssetBackend>,
    interval: Duration,
    max_failures: u32,
}

impl ProgressPoller {
    /// Create a poller with the configured interval and failure tolerance.
    pub fn new(backend: Arc<dyn AssetBackend>, config: &OrchestratorConfig) -> Self {
        Self {
            backend,
            interval: config.poll_interval(),
            max_failures: config.max_poll_failures.max(1),
        }
    }

    /// Poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start tracking an operation.
    ///
    /// The first poll is issued immediately; later polls follow the fixed
    /// interval, each awaited before the next is scheduled. Must be called
    /// from within a tokio runtime.
    pub fn track(&self, operation_id: OperationId) -> OperationTracker {
        let (progress_tx, progress_rx) = watch::channel(None);
        let close = CancellationToken::new();
        let cancel_requested = CancellationToken::new();

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.backend),
            operation_id.clone(),
            self.interval,
            self.max_failures,
            progress_tx,
            close.clone(),
            cancel_requested.clone(),
        ));

        OperationTracker {
            operation_id,
            backend: Arc::clone(&self.backend),
            progress: progress_rx,
            close,
            cancel_requested,
            task: Some(task),
        }
    }
}

async fn poll_loop(
    backend: Arc<dyn AssetBackend>,
    operation_id: OperationId,
    interval: Duration,
    max_failures: u32,
    progress_tx: watch::Sender<Option<BulkOperationProgress>>,
    close: CancellationToken,
    cancel_requested: CancellationToken,
) -> PollOutcome {
    let mut failures = 0u32;
    let mut final_poll = false;
    let last = |tx: &watch::Sender<Option<BulkOperationProgress>>| tx.borrow().clone();

    loop {
        let result = tokio::select! {
            biased;
            _ = close.cancelled() => return PollOutcome::Closed(last(&progress_tx)),
            result = backend.get_operation_progress(&operation_id) => result,
        };

        match result {
            Ok(progress) => {
                failures = 0;
                let progress = progress.normalized();
                let status = progress.status;
                progress_tx.send_replace(Some(progress.clone()));
                tracing::debug!(
                    operation = %operation_id,
                    %status,
                    processed = progress.processed_items,
                    total = progress.total_items,
                    "progress"
                );

                if status.is_terminal() {
                    return PollOutcome::Finished(progress);
                }
                if final_poll {
                    return PollOutcome::CancelPending(Some(progress));
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(operation = %operation_id, failures, error = %e, "poll failed");

                if failures >= max_failures {
                    return PollOutcome::Lost {
                        last: last(&progress_tx),
                        message: e.to_string(),
                    };
                }
                if final_poll {
                    return PollOutcome::CancelPending(last(&progress_tx));
                }
            }
        }

        tokio::select! {
            biased;
            _ = close.cancelled() => return PollOutcome::Closed(last(&progress_tx)),
            _ = cancel_requested.cancelled(), if !final_poll => {
                final_poll = true;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Handle to one tracked operation, the data source of its progress view.
///
/// Dropping the tracker stops polling.
#[derive(Debug)]
pub struct OperationTracker {
    operation_id: OperationId,
    backend: Arc<dyn AssetBackend>,
    progress: watch::Receiver<Option<BulkOperationProgress>>,
    close: CancellationToken,
    cancel_requested: CancellationToken,
    task: Option<JoinHandle<PollOutcome>>,
}

impl OperationTracker {
    /// The tracked operation.
    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Latest progress snapshot, None before the first poll returns.
    pub fn latest(&self) -> Option<BulkOperationProgress> {
        self.progress.borrow().clone()
    }

    /// Receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<BulkOperationProgress>> {
        self.progress.clone()
    }

    /// Whether polling has stopped.
    pub fn is_stopped(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request cancellation of the operation.
    ///
    /// A no-op when a terminal status has already been observed or a
    /// cancellation was already requested; returns whether a request was
    /// sent. The next poll decides the outcome: if the work finished before
    /// the cancellation landed, the completed result stands.
    pub async fn cancel(&self) -> Result<bool, BackendError> {
        if self.latest().is_some_and(|p| p.is_terminal()) || self.cancel_requested.is_cancelled() {
            return Ok(false);
        }

        let result = self.backend.cancel_operation(&self.operation_id).await;
        if let Err(e) = &result {
            tracing::warn!(operation = %self.operation_id, error = %e, "cancel request failed");
        }
        // Poll right away either way; the backend's answer is what counts.
        self.cancel_requested.cancel();
        result.map(|()| true)
    }

    /// Stop polling (the progress view was closed).
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Wait until polling stops and return how it ended.
    pub async fn outcome(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Closed(self.latest());
        };

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => PollOutcome::Lost {
                last: self.latest(),
                message: e.to_string(),
            },
        }
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        self.close.cancel();
    }
}
