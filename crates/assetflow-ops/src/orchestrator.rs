//! Session context tying selection, submission, polling, history and cache
//! together.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use assetflow_cache::{HierarchyProvider, PreloadReport, TreeCache};
use assetflow_core::{AssetId, OrchestratorConfig};
use assetflow_select::{SelectionContext, SelectionEngine};

use crate::backend::AssetBackend;
use crate::drop_validation::DropValidator;
use crate::error::{SubmissionError, UndoError};
use crate::history::{HistoryEntry, HistoryKind, HistoryManager};
use crate::invert::{invert, replay, AssetSnapshot};
use crate::operation::{BulkOperation, BulkOperationRequest, OperationOptions, OperationType};
use crate::poller::{OperationTracker, PollOutcome, ProgressPoller};
use crate::progress::{OperationReport, OperationStatus};
use crate::submit::OperationSubmitter;

/// Why an operation was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOrigin {
    /// Started by the user.
    Fresh,
    /// Reverting a history entry.
    Undo,
    /// Re-applying an undone history entry.
    Redo,
}

/// A submitted operation being polled.
#[derive(Debug)]
pub struct TrackedOperation {
    pub operation: BulkOperation,
    pub tracker: OperationTracker,
    /// Cached state of each asset at submission.
    pub snapshots: Vec<AssetSnapshot>,
    pub origin: OperationOrigin,
    /// View the assets were selected in.
    pub context: SelectionContext,
}

/// One UI session's worth of bulk operation state.
///
/// Owns the selection, history and cache, so independent sessions (and
/// tests) never share state.
#[derive(Debug)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    backend: Arc<dyn AssetBackend>,
    provider: Option<Arc<dyn HierarchyProvider>>,
    selection: SelectionEngine,
    submitter: OperationSubmitter,
    poller: ProgressPoller,
    history: HistoryManager,
    cache: TreeCache,
}

impl Orchestrator {
    /// Create a session talking to `backend`.
    pub fn new(backend: Arc<dyn AssetBackend>, config: OrchestratorConfig) -> Self {
        Self {
            submitter: OperationSubmitter::new(Arc::clone(&backend)),
            poller: ProgressPoller::new(Arc::clone(&backend), &config),
            history: HistoryManager::new(config.history_capacity),
            cache: TreeCache::new(&config.cache).with_batch_size(config.preload_batch_size),
            selection: SelectionEngine::new(),
            provider: None,
            backend,
            config,
        }
    }

    /// Load hierarchy data from `provider` for preloading and for
    /// snapshotting assets that are not cached at submission.
    pub fn with_provider(mut self, provider: Arc<dyn HierarchyProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionEngine {
        &mut self.selection
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn cache(&self) -> &TreeCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TreeCache {
        &mut self.cache
    }

    /// A drop validator using this session's backend and debounce.
    pub fn drop_validator(&self) -> DropValidator {
        DropValidator::new(Arc::clone(&self.backend), &self.config)
    }

    /// Drop selection, history and cached data.
    pub fn reset(&mut self) {
        self.selection.reset();
        self.history.clear();
        self.cache.invalidate_all();
    }

    /// Preload the subtrees below `roots` into the cache.
    ///
    /// Returns None when no hierarchy provider is configured.
    pub async fn preload(
        &mut self,
        roots: &[AssetId],
        depth: usize,
        cancel: &CancellationToken,
    ) -> Option<PreloadReport> {
        let provider = self.provider.clone()?;
        Some(self.cache.preload_nodes(&*provider, roots, depth, cancel).await)
    }

    /// Submit an operation over the current selection.
    ///
    /// The selection is cleared once the backend accepts the operation.
    pub async fn submit(
        &mut self,
        options: OperationOptions,
    ) -> Result<TrackedOperation, SubmissionError> {
        let context = self.selection.context();
        let request = BulkOperationRequest::new(self.selection.selected_assets(), options);
        let tracked = self.start(request, OperationOrigin::Fresh, context).await?;
        self.selection.select_none();
        Ok(tracked)
    }

    /// Submit an explicit request, leaving the selection alone.
    pub async fn submit_request(
        &mut self,
        request: BulkOperationRequest,
    ) -> Result<TrackedOperation, SubmissionError> {
        self.start(request, OperationOrigin::Fresh, SelectionContext::Manual)
            .await
    }

    async fn start(
        &mut self,
        request: BulkOperationRequest,
        origin: OperationOrigin,
        context: SelectionContext,
    ) -> Result<TrackedOperation, SubmissionError> {
        let request = OperationSubmitter::prepare(request)?;
        if let Some(provider) = self.provider.clone() {
            let missing: Vec<AssetId> = request
                .asset_ids
                .iter()
                .copied()
                .filter(|&id| !self.cache.has_node(id))
                .collect();
            if !missing.is_empty() {
                self.cache
                    .warm_cache(&*provider, &missing, &CancellationToken::new())
                    .await;
            }
        }

        let operation = self.submitter.submit(request).await?;
        let snapshots = operation
            .asset_ids
            .iter()
            .map(|&id| AssetSnapshot::new(id, self.cache.peek_node(id).cloned()))
            .collect();
        let tracker = self.poller.track(operation.id.clone());

        Ok(TrackedOperation {
            operation,
            tracker,
            snapshots,
            origin,
            context,
        })
    }

    /// Wait for a tracked operation to stop and settle its effects.
    ///
    /// Cached data for every asset the operation may have touched is
    /// invalidated unless validation failed. A user operation that completed
    /// is recorded in history, limited to the items that succeeded; bulk
    /// operations become one grouped entry. Exports are never recorded.
    pub async fn complete(&mut self, tracked: TrackedOperation) -> OperationReport {
        let TrackedOperation {
            operation,
            tracker,
            snapshots,
            origin,
            context,
        } = tracked;

        let outcome = tracker.outcome().await;
        let mut report =
            OperationReport::new(&operation, outcome.last_progress(), !outcome.is_finished());

        match &outcome {
            PollOutcome::Lost { message, .. } => {
                tracing::warn!(operation = %operation.id, %message, "lost track of operation");
            }
            PollOutcome::CancelPending(_) => {
                tracing::info!(operation = %operation.id, "cancellation not yet confirmed");
            }
            PollOutcome::Finished(_) | PollOutcome::Closed(_) => {}
        }

        let mutating = operation.operation_type.is_mutating();
        if mutating && report.status != OperationStatus::Failed {
            self.invalidate(&operation, &snapshots);
        }

        if mutating && origin == OperationOrigin::Fresh && report.status == OperationStatus::Completed
        {
            report.history_entry = self.record(&operation, snapshots, &report, context);
        }

        tracing::info!(operation = %operation.id, summary = %report.summary(), "operation settled");
        report
    }

    fn invalidate(&mut self, operation: &BulkOperation, snapshots: &[AssetSnapshot]) {
        let mut affected: HashSet<AssetId> = operation.asset_ids.iter().copied().collect();
        if let OperationOptions::Move(options) = &operation.options {
            affected.insert(options.new_parent_id);
        }
        affected.extend(
            snapshots
                .iter()
                .filter_map(|s| s.node.as_ref().and_then(|n| n.parent_id)),
        );

        for &id in &affected {
            self.cache.invalidate_node(id);
        }
        self.cache.invalidate_search_cache();
        tracing::debug!(operation = %operation.id, count = affected.len(), "cache invalidated");
    }

    fn record(
        &mut self,
        operation: &BulkOperation,
        snapshots: Vec<AssetSnapshot>,
        report: &OperationReport,
        context: SelectionContext,
    ) -> Option<u64> {
        if operation.operation_type == OperationType::Export {
            return None;
        }

        let skipped: HashSet<AssetId> = report.item_errors.iter().map(|e| e.asset_id).collect();
        let kind = HistoryKind::from(operation.operation_type);
        let mut entries: Vec<HistoryEntry> = snapshots
            .into_iter()
            .filter(|s| !skipped.contains(&s.asset_id))
            .map(|snapshot| {
                let asset_id = snapshot.asset_id;
                let request = BulkOperationRequest::new(vec![asset_id], operation.options.clone());
                HistoryEntry::new(
                    kind,
                    format!("{} asset {}", operation.operation_type.past_tense(), asset_id),
                    vec![asset_id],
                    to_json(&snapshot),
                    to_json(&request),
                )
            })
            .collect();

        let id = match entries.len() {
            0 => return None,
            1 => entries.pop().map(|entry| self.history.record(entry)),
            n => {
                let description = format!(
                    "{} {} assets ({})",
                    operation.operation_type.past_tense(),
                    n,
                    context
                );
                self.history.record_grouped(entries, description)
            }
        };
        tracing::debug!(operation = %operation.id, entry = ?id, "history recorded");
        id
    }

    /// Revert the most recent history entry.
    ///
    /// Returns None when there is nothing to undo. The entry moves to the
    /// redo stack once the inverse requests have been submitted. An entry
    /// that cannot be inverted is dropped and reported, so older entries
    /// stay reachable. If no request could be submitted the history is left
    /// unchanged.
    pub async fn undo(&mut self) -> Result<Option<Vec<TrackedOperation>>, UndoError> {
        let Some(entry) = self.history.peek_undo() else {
            return Ok(None);
        };
        let entry_id = entry.id;
        let requests = match invert(entry) {
            Ok(requests) => requests,
            Err(e) => {
                self.history.discard_undo();
                tracing::warn!(entry = entry_id, error = %e, "dropped irreversible history entry");
                return Err(e.into());
            }
        };

        let result = self.start_all(requests, OperationOrigin::Undo).await;
        if started_any(&result) {
            self.history.undo();
        }
        result.map(Some)
    }

    /// Re-apply the most recently undone entry.
    pub async fn redo(&mut self) -> Result<Option<Vec<TrackedOperation>>, UndoError> {
        let Some(entry) = self.history.peek_redo() else {
            return Ok(None);
        };
        let entry_id = entry.id;
        let requests = match replay(entry) {
            Ok(requests) => requests,
            Err(e) => {
                self.history.discard_redo();
                tracing::warn!(entry = entry_id, error = %e, "dropped unreplayable history entry");
                return Err(e.into());
            }
        };

        let result = self.start_all(requests, OperationOrigin::Redo).await;
        if started_any(&result) {
            self.history.redo();
        }
        result.map(Some)
    }

    /// Check every request locally, then submit them in order.
    async fn start_all(
        &mut self,
        requests: Vec<BulkOperationRequest>,
        origin: OperationOrigin,
    ) -> Result<Vec<TrackedOperation>, UndoError> {
        let requests = requests
            .into_iter()
            .map(OperationSubmitter::prepare)
            .collect::<Result<Vec<_>, _>>()?;

        let total = requests.len();
        let mut tracked = Vec::with_capacity(total);
        for request in requests {
            match self.start(request, origin, SelectionContext::Manual).await {
                Ok(operation) => tracked.push(operation),
                Err(error) if tracked.is_empty() => return Err(error.into()),
                Err(error) => {
                    tracing::warn!(started = tracked.len(), total, error = %error, "history step partially submitted");
                    return Err(UndoError::Partial {
                        remaining: total - tracked.len(),
                        started: tracked,
                        error,
                    });
                }
            }
        }
        Ok(tracked)
    }
}

/// Whether the backend accepted any of the requests of a history step.
fn started_any(result: &Result<Vec<TrackedOperation>, UndoError>) -> bool {
    matches!(result, Ok(_) | Err(UndoError::Partial { .. }))
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to serialize history data");
        Value::Null
    })
}
