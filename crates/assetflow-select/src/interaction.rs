//! Pointer and keyboard interaction policy.
//!
//! Implements the file-explorer convention:
//!
//! - plain click selects only the clicked item and moves the anchor there,
//! - Ctrl/Cmd click toggles one item and leaves the anchor alone,
//! - Shift click replaces the selection with the anchor-to-item run in
//!   display order, without moving the anchor,
//! - arrows move the cursor (plain: single select, Shift: extend the range,
//!   Ctrl: move focus only).
//!
//! Range operations fall back to plain single selection whenever the
//! anchor is unset or either endpoint is missing from the display order.

use assetflow_core::AssetId;

use crate::engine::SelectionEngine;

/// Modifier keys held during an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift is held.
    pub shift: bool,
    /// Ctrl (or Cmd on macOS) is held.
    pub ctrl: bool,
}

impl Modifiers {
    /// No modifiers.
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
    };
    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
    };
    /// Ctrl/Cmd only.
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
    };
}

/// Keys the selection surface reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKey {
    ArrowUp,
    ArrowDown,
    Home,
    End,
    /// Toggle the focused item.
    Space,
    /// Clear the selection.
    Escape,
    /// Select every visible item (Ctrl/Cmd+A).
    SelectAll,
    /// Any other key. Only switches to keyboard navigation mode.
    Other,
}

/// Contiguous run of `order` between `a` and `b`, inclusive, in display order.
///
/// Returns None if either endpoint is not in `order`.
pub fn range_between(order: &[AssetId], a: AssetId, b: AssetId) -> Option<&[AssetId]> {
    let start = order.iter().position(|&id| id == a)?;
    let end = order.iter().position(|&id| id == b)?;
    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
    Some(&order[lo..=hi])
}

impl SelectionEngine {
    /// Handle a click (or checkbox check) on `id`.
    pub fn click(&mut self, id: AssetId, modifiers: Modifiers, order: &[AssetId]) {
        self.state.keyboard_navigation_mode = false;

        if modifiers.shift {
            if let Some(anchor) = self.state.selection_anchor {
                if let Some(run) = range_between(order, anchor, id) {
                    self.replace_selection(run);
                    self.state.last_focused_asset = Some(id);
                    self.notify();
                    return;
                }
                tracing::debug!(%anchor, %id, "range endpoint not visible, single select");
            }
            self.select_single(id);
        } else if modifiers.ctrl {
            if !self.state.selected.shift_remove(&id) {
                self.state.selected.insert(id);
            }
            self.state.last_focused_asset = Some(id);
        } else {
            self.select_single(id);
        }

        self.notify();
    }

    /// Handle a key press directed at the selection surface.
    pub fn key(&mut self, key: NavigationKey, modifiers: Modifiers, order: &[AssetId]) {
        self.state.keyboard_navigation_mode = true;

        match key {
            NavigationKey::ArrowDown => {
                let target = self.step_index(order, 1);
                self.move_cursor(target, modifiers, order);
            }
            NavigationKey::ArrowUp => {
                let target = self.step_index(order, -1);
                self.move_cursor(target, modifiers, order);
            }
            NavigationKey::Home => {
                let target = (!order.is_empty()).then_some(0);
                self.move_cursor(target, modifiers, order);
            }
            NavigationKey::End => {
                let target = order.len().checked_sub(1);
                self.move_cursor(target, modifiers, order);
            }
            NavigationKey::Space => {
                if let Some(id) = self.state.last_focused_asset {
                    if !self.state.selected.shift_remove(&id) {
                        self.state.selected.insert(id);
                    }
                }
            }
            NavigationKey::Escape => {
                self.state.selected.clear();
                self.state.last_focused_asset = None;
                self.state.selection_anchor = None;
            }
            NavigationKey::SelectAll => {
                self.replace_selection(order);
            }
            NavigationKey::Other => {}
        }

        self.notify();
    }

    /// Pointer-down anywhere on the surface ends keyboard navigation mode.
    pub fn pointer_down(&mut self) {
        self.set_keyboard_navigation_mode(false);
    }

    /// The surface gained focus.
    pub fn focus(&mut self) {
        self.set_keyboard_navigation_mode(true);
    }

    /// The surface lost focus.
    pub fn blur(&mut self) {
        self.set_keyboard_navigation_mode(false);
    }

    fn select_single(&mut self, id: AssetId) {
        self.state.selected.clear();
        self.state.selected.insert(id);
        self.state.selection_anchor = Some(id);
        self.state.last_focused_asset = Some(id);
    }

    /// Index one step away from the cursor, clamped to the ends.
    ///
    /// Without a visible cursor, down starts at the top and up at the bottom.
    fn step_index(&self, order: &[AssetId], delta: isize) -> Option<usize> {
        if order.is_empty() {
            return None;
        }
        let last = order.len() - 1;
        let current = self
            .state
            .last_focused_asset
            .and_then(|focused| order.iter().position(|&id| id == focused));

        Some(match current {
            Some(index) => index.saturating_add_signed(delta).min(last),
            None if delta > 0 => 0,
            None => last,
        })
    }

    fn move_cursor(&mut self, target: Option<usize>, modifiers: Modifiers, order: &[AssetId]) {
        let Some(target) = target.and_then(|index| order.get(index).copied()) else {
            return;
        };

        if modifiers.shift {
            let anchor = match self.state.selection_anchor {
                Some(anchor) => anchor,
                None => {
                    let anchor = self.state.last_focused_asset.unwrap_or(target);
                    self.state.selection_anchor = Some(anchor);
                    anchor
                }
            };

            match range_between(order, anchor, target) {
                Some(run) => {
                    self.replace_selection(run);
                    self.state.last_focused_asset = Some(target);
                }
                None => self.select_single(target),
            }
        } else if modifiers.ctrl {
            self.state.last_focused_asset = Some(target);
        } else {
            self.select_single(target);
        }
    }
}
