use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use assetflow_core::{AssetId, OrchestratorConfig, TreeNode};
use assetflow_ops::{
    AssetBackend, BackendError, BulkOperationProgress, BulkOperationRequest, DeleteOptions,
    ExportOptions, HistoryEntry, HistoryKind, HistoryManager, InversionError, MoveOptions,
    OperationId, OperationItemError, OperationOptions, OperationReport, OperationStatus,
    Orchestrator, PollOutcome, ProgressPoller, SimulatedBackend, SubmissionError, UndoError,
};
use assetflow_select::SelectionContext;

fn ids(raw: &[u64]) -> Vec<AssetId> {
    raw.iter().copied().map(AssetId).collect()
}

fn snapshot(
    status: OperationStatus,
    total: u64,
    processed: u64,
    failed: u64,
) -> BulkOperationProgress {
    BulkOperationProgress::pending(OperationId::new("scripted"), total)
        .with_status(status)
        .with_counts(processed, failed)
}

/// Root 1, folders 2 and 3, devices 4-6 in folder 2 and 7-9 in folder 3.
fn session() -> (Arc<SimulatedBackend>, Orchestrator) {
    let backend = Arc::new(SimulatedBackend::sample(2, 3));
    let orchestrator = Orchestrator::new(backend.clone(), OrchestratorConfig::default())
        .with_provider(backend.clone());
    (backend, orchestrator)
}

async fn submit_request(
    orchestrator: &mut Orchestrator,
    asset_ids: &[u64],
    options: OperationOptions,
) -> OperationReport {
    let tracked = orchestrator
        .submit_request(BulkOperationRequest::new(ids(asset_ids), options))
        .await
        .unwrap();
    orchestrator.complete(tracked).await
}

// Submission

#[tokio::test(start_paused = true)]
async fn test_empty_selection_never_reaches_backend() {
    let (backend, mut orchestrator) = session();

    let result = orchestrator
        .submit(OperationOptions::Delete(DeleteOptions::default()))
        .await;

    assert!(matches!(result, Err(SubmissionError::EmptySelection)));
    assert_eq!(backend.calls().submit, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_loads_nothing() {
    let (backend, mut orchestrator) = session();

    let result = orchestrator
        .submit_request(BulkOperationRequest::new(
            ids(&[2, 4]),
            OperationOptions::Move(MoveOptions::to(AssetId(2))),
        ))
        .await;

    assert!(matches!(result, Err(SubmissionError::InvalidOptions { .. })));
    assert!(!orchestrator.cache().has_node(AssetId(2)));
    assert!(!orchestrator.cache().has_node(AssetId(4)));
    assert_eq!(orchestrator.cache().metrics().cache_size, 0);
    assert_eq!(backend.calls().submit, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_options_rejected_locally() {
    let (backend, mut orchestrator) = session();
    orchestrator
        .selection_mut()
        .select_all(&ids(&[2, 4]), SelectionContext::Tree);

    let result = orchestrator
        .submit(OperationOptions::Move(MoveOptions::to(AssetId(2))))
        .await;

    assert!(matches!(result, Err(SubmissionError::InvalidOptions { .. })));
    assert_eq!(backend.calls().submit, 0);
    assert_eq!(orchestrator.selection().selected_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_submission_keeps_selection() {
    let (backend, mut orchestrator) = session();
    backend.fail_next_submit(BackendError::rejected("quota exceeded"));
    orchestrator
        .selection_mut()
        .select_all(&ids(&[4, 5]), SelectionContext::Search);

    let result = orchestrator
        .submit(OperationOptions::Export(ExportOptions::default()))
        .await;

    assert!(matches!(result, Err(SubmissionError::Rejected { .. })));
    assert_eq!(backend.calls().submit, 1);
    assert_eq!(orchestrator.selection().selected_assets(), ids(&[4, 5]));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ids_submitted_once() {
    let (_backend, mut orchestrator) = session();
    let tracked = orchestrator
        .submit_request(BulkOperationRequest::new(
            ids(&[4, 5, 4, 5]),
            OperationOptions::Export(ExportOptions::default()),
        ))
        .await
        .unwrap();

    assert_eq!(tracked.operation.asset_ids, ids(&[4, 5]));
    tracked.tracker.close();
}

// Polling

#[tokio::test(start_paused = true)]
async fn test_polls_at_fixed_interval() {
    let backend = Arc::new(SimulatedBackend::sample(1, 3));
    backend.script_next(vec![
        Ok(snapshot(OperationStatus::Processing, 3, 1, 0)),
        Ok(snapshot(OperationStatus::Processing, 3, 2, 0)),
        Ok(snapshot(OperationStatus::Completed, 3, 3, 0)),
    ]);
    let id = submit_export(&backend, &[3, 4, 5]).await;

    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());
    assert_eq!(poller.interval(), Duration::from_millis(1000));

    let start = Instant::now();
    let outcome = poller.track(id).outcome().await;

    assert!(outcome.is_finished());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2100), "{elapsed:?}");
    assert_eq!(backend.calls().progress, 3);
}

#[tokio::test(start_paused = true)]
async fn test_processed_equals_total_with_failures_completes() {
    let backend = Arc::new(SimulatedBackend::sample(1, 3));
    backend.script_next(vec![
        Ok(snapshot(OperationStatus::Processing, 10, 8, 1)),
        Ok(snapshot(OperationStatus::Processing, 10, 10, 2)
            .with_error(OperationItemError::item(AssetId(3), "a", "locked"))
            .with_error(OperationItemError::item(AssetId(4), "b", "locked"))),
    ]);
    let id = submit_export(&backend, &[3]).await;
    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());

    let outcome = poller.track(id).outcome().await;

    let PollOutcome::Finished(progress) = &outcome else {
        panic!("expected a terminal status, got {outcome:?}");
    };
    assert_eq!(progress.status, OperationStatus::Completed);
    assert_eq!(progress.failed_items, 2);
    assert_eq!(progress.succeeded_items(), 8);
    assert_eq!(progress.item_errors().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_polling() {
    let backend = Arc::new(SimulatedBackend::sample(1, 1));
    backend.script_next(vec![Ok(snapshot(OperationStatus::Processing, 10, 1, 0))]);
    let id = submit_export(&backend, &[3]).await;
    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());

    let tracker = poller.track(id);
    let _ = tracker
        .subscribe()
        .wait_for(|p| p.is_some())
        .await
        .unwrap();
    tracker.close();
    let outcome = tracker.outcome().await;

    assert!(matches!(outcome, PollOutcome::Closed(Some(_))));
    let polls = backend.calls().progress;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.calls().progress, polls);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_lose_tracking() {
    let backend = Arc::new(SimulatedBackend::sample(1, 1));
    backend.script_next(vec![Err(BackendError::transport("gateway timeout"))]);
    let id = submit_export(&backend, &[3]).await;
    let config = OrchestratorConfig::builder()
        .max_poll_failures(3u32)
        .build()
        .unwrap();
    let poller = ProgressPoller::new(backend.clone(), &config);

    let outcome = poller.track(id).outcome().await;

    let PollOutcome::Lost { last, message } = &outcome else {
        panic!("expected tracking to be lost, got {outcome:?}");
    };
    assert!(last.is_none());
    assert!(message.contains("gateway timeout"));
    assert_eq!(backend.calls().progress, 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_loses_race_to_completion() {
    let backend = Arc::new(SimulatedBackend::sample(1, 1));
    backend.script_next(vec![
        Ok(snapshot(OperationStatus::Processing, 10, 5, 0)),
        Ok(snapshot(OperationStatus::Completed, 10, 10, 0)),
    ]);
    let id = submit_export(&backend, &[3]).await;
    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());

    let tracker = poller.track(id);
    let _ = tracker
        .subscribe()
        .wait_for(|p| p.is_some())
        .await
        .unwrap();
    assert!(tracker.cancel().await.unwrap());
    assert!(!tracker.cancel().await.unwrap());

    let outcome = tracker.outcome().await;
    assert_eq!(
        outcome.last_progress().map(|p| p.status),
        Some(OperationStatus::Completed)
    );
    assert_eq!(backend.calls().cancel, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unconfirmed_by_final_poll() {
    let backend = Arc::new(SimulatedBackend::sample(1, 1));
    backend.script_next(vec![Ok(snapshot(OperationStatus::Processing, 10, 5, 0))]);
    let id = submit_export(&backend, &[3]).await;
    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());

    let tracker = poller.track(id);
    let _ = tracker
        .subscribe()
        .wait_for(|p| p.is_some())
        .await
        .unwrap();
    tracker.cancel().await.unwrap();

    assert!(matches!(
        tracker.outcome().await,
        PollOutcome::CancelPending(Some(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_terminal_is_noop() {
    let backend = Arc::new(SimulatedBackend::sample(1, 1));
    backend.script_next(vec![Ok(snapshot(OperationStatus::Completed, 1, 1, 0))]);
    let id = submit_export(&backend, &[3]).await;
    let poller = ProgressPoller::new(backend.clone(), &OrchestratorConfig::default());

    let tracker = poller.track(id);
    let _ = tracker
        .subscribe()
        .wait_for(|p| p.as_ref().is_some_and(|p| p.is_terminal()))
        .await
        .unwrap();

    assert!(!tracker.cancel().await.unwrap());
    assert_eq!(backend.calls().cancel, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_keeps_processed_items() {
    let (backend, mut orchestrator) = session();
    let tracked = orchestrator
        .submit_request(BulkOperationRequest::new(
            ids(&[4, 5, 6]),
            OperationOptions::Move(MoveOptions::to(AssetId(3))),
        ))
        .await
        .unwrap();

    let _ = tracked
        .tracker
        .subscribe()
        .wait_for(|p| p.as_ref().is_some_and(|p| p.processed_items == 1))
        .await
        .unwrap();
    tracked.tracker.cancel().await.unwrap();
    let report = orchestrator.complete(tracked).await;

    assert_eq!(report.status, OperationStatus::Cancelled);
    assert_eq!(report.succeeded, 1);
    assert!(report.history_entry.is_none());
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(3)));
    assert_eq!(backend.node(AssetId(5)).unwrap().parent_id, Some(AssetId(2)));
}

// History

#[test]
fn test_history_keeps_most_recent_fifty() {
    let mut history = HistoryManager::default();
    for n in 1..=60 {
        history.record(HistoryEntry::new(
            HistoryKind::Classify,
            format!("entry {n}"),
            vec![AssetId(n)],
            json!(null),
            json!(null),
        ));
    }

    assert_eq!(history.len(), 50);
    assert_eq!(history.iter().next().unwrap().asset_ids, vec![AssetId(11)]);
    assert_eq!(history.peek_undo().unwrap().asset_ids, vec![AssetId(60)]);
}

#[test]
fn test_undo_on_empty_history() {
    let mut history = HistoryManager::default();
    assert!(history.undo().is_none());
    assert!(!history.can_redo());
    assert!(history.is_empty());
}

// Orchestration

#[tokio::test(start_paused = true)]
async fn test_bulk_move_records_grouped_entry_and_invalidates_cache() {
    let (backend, mut orchestrator) = session();
    let report = orchestrator
        .preload(&[AssetId(1)], 2, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.loaded, 8);
    orchestrator
        .cache_mut()
        .set_search("device", vec![TreeNode::device(AssetId(4), "device-1-1", Some(AssetId(2)))]);

    orchestrator
        .selection_mut()
        .select_all(&ids(&[4, 5]), SelectionContext::Search);
    let tracked = orchestrator
        .submit(OperationOptions::Move(MoveOptions::to(AssetId(3))))
        .await
        .unwrap();
    assert_eq!(orchestrator.selection().selected_count(), 0);
    assert_eq!(tracked.snapshots.len(), 2);

    let report = orchestrator.complete(tracked).await;
    assert!(report.is_success());
    assert_eq!(report.summary(), "Moved 2 items");

    let entry = orchestrator.history().peek_undo().unwrap();
    assert_eq!(Some(entry.id), report.history_entry);
    assert!(entry.grouped);
    assert_eq!(entry.kind, HistoryKind::Move);
    assert_eq!(entry.asset_ids, ids(&[4, 5]));
    assert!(entry.description.contains("search"));

    let cache = orchestrator.cache_mut();
    for id in [2, 3, 4, 5] {
        assert!(!cache.has_node(AssetId(id)), "asset {id} still cached");
    }
    assert!(cache.has_node(AssetId(6)));
    assert!(cache.get_search("device").is_none());
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(3)));
}

#[tokio::test(start_paused = true)]
async fn test_undo_and_redo_move() {
    let (backend, mut orchestrator) = session();
    submit_request(
        &mut orchestrator,
        &[4, 7],
        OperationOptions::Move(MoveOptions::to(AssetId(1))),
    )
    .await;
    assert_eq!(backend.node(AssetId(7)).unwrap().parent_id, Some(AssetId(1)));

    let undo = orchestrator.undo().await.unwrap().unwrap();
    assert_eq!(undo.len(), 2);
    for tracked in undo {
        let report = orchestrator.complete(tracked).await;
        assert_eq!(report.status, OperationStatus::Completed);
        assert!(report.history_entry.is_none());
    }
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(2)));
    assert_eq!(backend.node(AssetId(7)).unwrap().parent_id, Some(AssetId(3)));
    assert!(orchestrator.history().is_empty());
    assert!(orchestrator.history().can_redo());

    let redo = orchestrator.redo().await.unwrap().unwrap();
    assert_eq!(redo.len(), 1);
    for tracked in redo {
        orchestrator.complete(tracked).await;
    }
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(1)));
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_undo_with_empty_history() {
    let (backend, mut orchestrator) = session();
    assert!(orchestrator.undo().await.unwrap().is_none());
    assert!(orchestrator.redo().await.unwrap().is_none());
    assert_eq!(backend.calls().submit, 0);
}

#[tokio::test(start_paused = true)]
async fn test_irreversible_entry_is_dropped_on_undo() {
    let (backend, mut orchestrator) = session();
    submit_request(
        &mut orchestrator,
        &[4],
        OperationOptions::Move(MoveOptions::to(AssetId(3))),
    )
    .await;
    let report = submit_request(
        &mut orchestrator,
        &[8],
        OperationOptions::Delete(DeleteOptions::default()),
    )
    .await;
    assert!(report.history_entry.is_some());
    assert!(backend.node(AssetId(8)).is_none());
    assert_eq!(orchestrator.history().len(), 2);

    let result = orchestrator.undo().await;
    assert!(matches!(
        result,
        Err(UndoError::Inversion(InversionError::NotReversible { .. }))
    ));
    assert_eq!(orchestrator.history().len(), 1);
    assert!(!orchestrator.history().can_redo());

    // The move below the delete is still reachable
    let undo = orchestrator.undo().await.unwrap().unwrap();
    for tracked in undo {
        orchestrator.complete(tracked).await;
    }
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(2)));
    assert!(orchestrator.history().is_empty());
    assert_eq!(backend.calls().submit, 3);
}

#[tokio::test(start_paused = true)]
async fn test_undo_partially_submitted_moves_entry_to_redo() {
    let (backend, mut orchestrator) = session();
    submit_request(
        &mut orchestrator,
        &[4, 7],
        OperationOptions::Move(MoveOptions::to(AssetId(1))),
    )
    .await;

    // The first inverse move is accepted, the second is not
    backend.fail_submit_after(1, BackendError::transport("connection reset"));
    let Err(UndoError::Partial {
        started,
        remaining,
        error,
    }) = orchestrator.undo().await
    else {
        panic!("expected a partially submitted undo");
    };
    assert_eq!(started.len(), 1);
    assert_eq!(remaining, 1);
    assert!(matches!(error, SubmissionError::Transport { .. }));
    assert!(orchestrator.history().is_empty());
    assert!(orchestrator.history().can_redo());

    for tracked in started {
        let report = orchestrator.complete(tracked).await;
        assert_eq!(report.status, OperationStatus::Completed);
    }
    assert_eq!(backend.node(AssetId(4)).unwrap().parent_id, Some(AssetId(2)));
    assert_eq!(backend.node(AssetId(7)).unwrap().parent_id, Some(AssetId(1)));
    assert!(!orchestrator.cache().has_node(AssetId(4)));
    assert_eq!(backend.calls().submit, 3);
}

#[tokio::test(start_paused = true)]
async fn test_undo_rejected_outright_keeps_history() {
    let (backend, mut orchestrator) = session();
    submit_request(
        &mut orchestrator,
        &[4, 7],
        OperationOptions::Move(MoveOptions::to(AssetId(1))),
    )
    .await;

    backend.fail_next_submit(BackendError::rejected("queue full"));
    let result = orchestrator.undo().await;
    assert!(matches!(
        result,
        Err(UndoError::Submission(SubmissionError::Rejected { .. }))
    ));
    assert_eq!(orchestrator.history().len(), 1);
    assert!(!orchestrator.history().can_redo());

    let undo = orchestrator.undo().await.unwrap().unwrap();
    assert_eq!(undo.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_partial_success_records_only_succeeded_items() {
    let (backend, mut orchestrator) = session();
    backend.fail_item(AssetId(5));

    let report = submit_request(
        &mut orchestrator,
        &[4, 5, 6],
        OperationOptions::Move(MoveOptions::to(AssetId(3))),
    )
    .await;

    assert_eq!(report.status, OperationStatus::Completed);
    assert_eq!(report.failed, 1);
    assert_eq!(report.item_errors.len(), 1);
    assert_eq!(report.summary(), "Moved 2 items, 1 skipped");
    let entry = orchestrator.history().peek_undo().unwrap();
    assert_eq!(entry.asset_ids, ids(&[4, 6]));
}

#[tokio::test(start_paused = true)]
async fn test_blocking_validation_changes_nothing() {
    let (backend, mut orchestrator) = session();
    backend.protect(AssetId(4));

    let report = submit_request(
        &mut orchestrator,
        &[4, 5],
        OperationOptions::Delete(DeleteOptions::default()),
    )
    .await;

    assert_eq!(report.status, OperationStatus::Failed);
    assert_eq!(report.blocking_errors.len(), 1);
    assert!(report.summary().contains("nothing changed"));
    assert!(report.history_entry.is_none());
    assert!(backend.node(AssetId(5)).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_export_is_not_recorded() {
    let (_backend, mut orchestrator) = session();
    let report = submit_request(
        &mut orchestrator,
        &[4, 5],
        OperationOptions::Export(ExportOptions::default()),
    )
    .await;

    assert!(report.is_success());
    assert!(report.history_entry.is_none());
    assert!(orchestrator.history().is_empty());
}

// Drop validation

#[tokio::test(start_paused = true)]
async fn test_hover_validation_is_debounced() {
    let (backend, orchestrator) = session();
    let mut validator = orchestrator.drop_validator();

    validator.hover(ids(&[4]), AssetId(1));
    validator.hover(ids(&[4]), AssetId(9));
    validator.hover(ids(&[4]), AssetId(3));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(backend.calls().validate, 1);
    let verdict = validator.latest().unwrap();
    assert_eq!(verdict.target, AssetId(3));
    assert!(verdict.allows_drop());
}

#[tokio::test(start_paused = true)]
async fn test_drop_onto_self_decided_locally() {
    let (backend, orchestrator) = session();
    let mut validator = orchestrator.drop_validator();

    validator.hover(ids(&[2, 4]), AssetId(2));
    let verdict = validator.latest().unwrap();
    assert!(!verdict.allows_drop());

    let result = validator.validate_on_drop(&ids(&[2]), AssetId(2)).await.unwrap();
    assert!(!result.is_valid);
    assert_eq!(backend.calls().validate, 0);

    let result = validator.validate_on_drop(&ids(&[2]), AssetId(5)).await.unwrap();
    assert!(!result.is_valid);
    assert_eq!(backend.calls().validate, 1);
}

/// Submit a plain export directly to the backend.
async fn submit_export(backend: &SimulatedBackend, asset_ids: &[u64]) -> OperationId {
    backend
        .submit_operation(
            &ids(asset_ids),
            &OperationOptions::Export(ExportOptions::default()),
        )
        .await
        .unwrap()
}
