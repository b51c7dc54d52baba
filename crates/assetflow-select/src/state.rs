//! Selection state types.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use assetflow_core::AssetId;

/// Which view produced the current selection.
///
/// Used for history descriptions and analytics, never for correctness.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SelectionContext {
    /// The hierarchy tree.
    #[default]
    Tree,
    /// A search result list.
    Search,
    /// Programmatic selection.
    Manual,
}

/// Current selection, cursor and anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Selected assets in insertion order. Order carries no meaning.
    pub selected: IndexSet<AssetId>,
    /// View that produced the selection.
    pub context: SelectionContext,
    /// Keyboard navigation cursor.
    pub last_focused_asset: Option<AssetId>,
    /// Fixed endpoint for range selection.
    pub selection_anchor: Option<AssetId>,
    /// True while the user is navigating with the keyboard.
    pub keyboard_navigation_mode: bool,
}

impl SelectionState {
    /// Snapshot for change subscribers.
    pub fn change(&self) -> SelectionChange {
        SelectionChange {
            selected_count: self.selected.len(),
            context: self.context,
            last_focused_asset: self.last_focused_asset,
            selection_anchor: self.selection_anchor,
            keyboard_navigation_mode: self.keyboard_navigation_mode,
        }
    }
}

/// Notification sent to subscribers after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    pub selected_count: usize,
    pub context: SelectionContext,
    pub last_focused_asset: Option<AssetId>,
    pub selection_anchor: Option<AssetId>,
    pub keyboard_navigation_mode: bool,
}
