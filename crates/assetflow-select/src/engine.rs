//! Selection engine core operations and change notifications.

use tokio::sync::broadcast;

use assetflow_core::AssetId;

use crate::state::{SelectionChange, SelectionContext, SelectionState};

/// Buffer size of the change notification channel.
pub const SELECTION_CHANNEL_SIZE: usize = 64;

/// Owner of the selection state.
///
/// Every mutation is applied synchronously and followed by a
/// [`SelectionChange`] broadcast. Subscribers unsubscribe by dropping
/// their receiver.
#[derive(Debug)]
pub struct SelectionEngine {
    pub(crate) state: SelectionState,
    changes: broadcast::Sender<SelectionChange>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngine {
    /// Create an engine with an empty selection.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(SELECTION_CHANNEL_SIZE);
        Self {
            state: SelectionState::default(),
            changes,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionChange> {
        self.changes.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub(crate) fn notify(&self) {
        // No subscribers is not an error
        let _ = self.changes.send(self.state.change());
    }

    /// Read-only view of the full state.
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Return to the initial state (empty selection, tree context, pointer mode).
    pub fn reset(&mut self) {
        self.state = SelectionState::default();
        self.notify();
    }

    /// Flip membership of `id`.
    pub fn toggle_asset(&mut self, id: AssetId, context: SelectionContext) {
        if !self.state.selected.shift_remove(&id) {
            self.state.selected.insert(id);
        }
        self.state.context = context;
        self.notify();
    }

    /// Add `id` to the selection. Idempotent.
    pub fn select_asset(&mut self, id: AssetId, context: SelectionContext) {
        self.state.selected.insert(id);
        self.state.context = context;
        self.notify();
    }

    /// Remove `id` from the selection. Idempotent.
    pub fn deselect_asset(&mut self, id: AssetId) {
        self.state.selected.shift_remove(&id);
        self.notify();
    }

    /// Replace the selection with every id in `ids`, duplicates collapsed.
    pub fn select_all(&mut self, ids: &[AssetId], context: SelectionContext) {
        self.state.selected = ids.iter().copied().collect();
        self.state.context = context;
        self.notify();
    }

    /// Clear the selection, the cursor and the anchor.
    pub fn select_none(&mut self) {
        self.state.selected.clear();
        self.state.last_focused_asset = None;
        self.state.selection_anchor = None;
        self.notify();
    }

    /// Replace the selection with exactly `ids`.
    pub(crate) fn replace_selection(&mut self, ids: &[AssetId]) {
        self.state.selected = ids.iter().copied().collect();
    }

    /// Drop selected ids that no longer exist. Returns how many were removed.
    ///
    /// The engine never checks liveness on its own; callers prune after the
    /// hierarchy changes.
    pub fn prune(&mut self, is_live: impl Fn(AssetId) -> bool) -> usize {
        let before = self.state.selected.len();
        self.state.selected.retain(|&id| is_live(id));
        let removed = before - self.state.selected.len();
        if removed > 0 {
            tracing::debug!(removed, "pruned stale selection entries");
            self.notify();
        }
        removed
    }

    /// Check whether `id` is selected.
    pub fn is_selected(&self, id: AssetId) -> bool {
        self.state.selected.contains(&id)
    }

    /// Selected ids, in the order they were added.
    pub fn selected_assets(&self) -> Vec<AssetId> {
        self.state.selected.iter().copied().collect()
    }

    /// Number of selected ids.
    pub fn selected_count(&self) -> usize {
        self.state.selected.len()
    }

    /// View that produced the current selection.
    pub fn context(&self) -> SelectionContext {
        self.state.context
    }

    /// Set the context used by subsequent pointer and keyboard interactions.
    pub fn set_context(&mut self, context: SelectionContext) {
        self.state.context = context;
    }

    /// Keyboard cursor.
    pub fn last_focused_asset(&self) -> Option<AssetId> {
        self.state.last_focused_asset
    }

    /// Range anchor.
    pub fn selection_anchor(&self) -> Option<AssetId> {
        self.state.selection_anchor
    }

    /// Whether keyboard focus affordances should be shown.
    pub fn keyboard_navigation_mode(&self) -> bool {
        self.state.keyboard_navigation_mode
    }

    /// Move the keyboard cursor.
    pub fn set_last_focused_asset(&mut self, id: Option<AssetId>) {
        self.state.last_focused_asset = id;
        self.notify();
    }

    /// Move the range anchor.
    pub fn set_selection_anchor(&mut self, id: Option<AssetId>) {
        self.state.selection_anchor = id;
        self.notify();
    }

    /// Switch keyboard navigation mode.
    pub fn set_keyboard_navigation_mode(&mut self, enabled: bool) {
        if self.state.keyboard_navigation_mode != enabled {
            self.state.keyboard_navigation_mode = enabled;
            self.notify();
        }
    }
}
