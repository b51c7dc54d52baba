//! Debounced move validation for drag and drop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use assetflow_core::{AssetId, OrchestratorConfig};

use crate::backend::{AssetBackend, ValidationResult};
use crate::error::BackendError;

/// Validation result for one hovered drop target.
#[derive(Debug, Clone, PartialEq)]
pub struct DropVerdict {
    pub asset_ids: Vec<AssetId>,
    pub target: AssetId,
    pub result: Result<ValidationResult, BackendError>,
}

impl DropVerdict {
    /// Whether the drop should be allowed.
    pub fn allows_drop(&self) -> bool {
        self.result.as_ref().is_ok_and(|r| r.is_valid)
    }
}

/// Validates drop targets while dragging without a request per pointer move.
///
/// Each hover replaces the previous one: only a target that stays hovered
/// for the debounce period is sent to the backend, and a verdict is
/// published only if no newer hover arrived in the meantime.
#[derive(Debug)]
pub struct DropValidator {
    backend: Arc<dyn AssetBackend>,
    debounce: Duration,
    pending: Option<CancellationToken>,
    verdicts: Arc<watch::Sender<Option<DropVerdict>>>,
}

impl DropValidator {
    pub fn new(backend: Arc<dyn AssetBackend>, config: &OrchestratorConfig) -> Self {
        let (verdicts, _) = watch::channel(None);
        Self {
            backend,
            debounce: config.drop_validation_debounce(),
            pending: None,
            verdicts: Arc::new(verdicts),
        }
    }

    /// Receiver notified when a verdict is published.
    pub fn subscribe(&self) -> watch::Receiver<Option<DropVerdict>> {
        self.verdicts.subscribe()
    }

    /// The most recent verdict.
    pub fn latest(&self) -> Option<DropVerdict> {
        self.verdicts.borrow().clone()
    }

    /// The pointer is over `target` while dragging `asset_ids`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn hover(&mut self, asset_ids: Vec<AssetId>, target: AssetId) {
        self.cancel_pending();

        if asset_ids.contains(&target) {
            self.verdicts.send_replace(Some(DropVerdict {
                asset_ids,
                result: Ok(ValidationResult::self_move(target)),
                target,
            }));
            return;
        }

        let token = CancellationToken::new();
        self.pending = Some(token.clone());

        let backend = Arc::clone(&self.backend);
        let verdicts = Arc::clone(&self.verdicts);
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = backend.validate_bulk_move(&asset_ids, target) => result,
            };

            if let Err(e) = &result {
                tracing::debug!(%target, error = %e, "drop validation failed");
            }

            // A newer hover may have landed while the request was in flight.
            verdicts.send_if_modified(|current| {
                if token.is_cancelled() {
                    return false;
                }
                *current = Some(DropVerdict {
                    asset_ids,
                    target,
                    result,
                });
                true
            });
        });
    }

    /// The pointer left every drop target.
    pub fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// Validate an actual drop, bypassing the debounce.
    pub async fn validate_on_drop(
        &mut self,
        asset_ids: &[AssetId],
        target: AssetId,
    ) -> Result<ValidationResult, BackendError> {
        self.cancel_pending();

        if asset_ids.contains(&target) {
            return Ok(ValidationResult::self_move(target));
        }
        self.backend.validate_bulk_move(asset_ids, target).await
    }
}

impl Drop for DropValidator {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
