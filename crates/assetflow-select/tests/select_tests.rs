use std::collections::HashMap;

use assetflow_core::AssetId;
use assetflow_select::{Modifiers, NavigationKey, SelectionContext, SelectionEngine};

fn ids(raw: &[u64]) -> Vec<AssetId> {
    raw.iter().copied().map(AssetId).collect()
}

fn selected(engine: &SelectionEngine) -> Vec<u64> {
    let mut out: Vec<u64> = engine.selected_assets().into_iter().map(|a| a.0).collect();
    out.sort_unstable();
    out
}

#[test]
fn test_membership_follows_net_parity() {
    let mut engine = SelectionEngine::new();
    let mut expected: HashMap<u64, bool> = HashMap::new();

    // Deterministic mixed sequence of add/remove/toggle calls
    let script: &[(u8, u64)] = &[
        (0, 1), (2, 1), (2, 2), (0, 3), (1, 3), (2, 3), (2, 3), (0, 2),
        (1, 1), (2, 4), (2, 4), (2, 4), (0, 5), (0, 5), (1, 5), (2, 1),
    ];

    for &(op, raw) in script {
        let id = AssetId(raw);
        let entry = expected.entry(raw).or_insert(false);
        match op {
            0 => {
                engine.select_asset(id, SelectionContext::Tree);
                *entry = true;
            }
            1 => {
                engine.deselect_asset(id);
                *entry = false;
            }
            _ => {
                engine.toggle_asset(id, SelectionContext::Tree);
                *entry = !*entry;
            }
        }
    }

    for (raw, want) in expected {
        assert_eq!(engine.is_selected(AssetId(raw)), want, "asset {raw}");
    }
}

#[test]
fn test_shift_click_replaces_with_range() {
    let order = ids(&[1, 2, 3, 4, 5]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(2), Modifiers::NONE, &order);
    assert_eq!(engine.selection_anchor(), Some(AssetId(2)));

    engine.click(AssetId(4), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![2, 3, 4]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(2)));
    assert_eq!(engine.last_focused_asset(), Some(AssetId(4)));

    // Same anchor, other direction: replacement, not union
    engine.click(AssetId(1), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![1, 2]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(2)));
}

#[test]
fn test_shift_click_ignores_previous_selection() {
    let order = ids(&[1, 2, 3, 4, 5]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(3), Modifiers::NONE, &order);
    engine.click(AssetId(5), Modifiers::CTRL, &order);
    engine.click(AssetId(1), Modifiers::CTRL, &order);
    assert_eq!(selected(&engine), vec![1, 3, 5]);

    engine.click(AssetId(4), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![3, 4]);
}

#[test]
fn test_shift_click_without_anchor_is_plain_click() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(3), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![3]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(3)));
}

#[test]
fn test_shift_click_with_unknown_endpoint_degrades() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(2), Modifiers::NONE, &order);
    engine.click(AssetId(42), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![42]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(42)));

    // Anchor no longer visible
    engine.click(AssetId(1), Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![1]);
}

#[test]
fn test_ctrl_click_toggles_and_keeps_anchor() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(1), Modifiers::NONE, &order);
    engine.click(AssetId(3), Modifiers::CTRL, &order);
    assert_eq!(selected(&engine), vec![1, 3]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(1)));
    assert_eq!(engine.last_focused_asset(), Some(AssetId(3)));

    engine.click(AssetId(1), Modifiers::CTRL, &order);
    assert_eq!(selected(&engine), vec![3]);
}

#[test]
fn test_plain_click_collapses_selection() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();
    engine.select_all(&order, SelectionContext::Tree);

    engine.click(AssetId(2), Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![2]);
    assert_eq!(engine.last_focused_asset(), Some(AssetId(2)));
}

#[test]
fn test_arrow_keys_move_single_selection() {
    let order = ids(&[10, 20, 30]);
    let mut engine = SelectionEngine::new();

    engine.key(NavigationKey::ArrowDown, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![10]);
    assert!(engine.keyboard_navigation_mode());

    engine.key(NavigationKey::ArrowDown, Modifiers::NONE, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::NONE, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![30]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(30)));

    engine.key(NavigationKey::ArrowUp, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![20]);
}

#[test]
fn test_shift_arrow_extends_and_shrinks() {
    let order = ids(&[1, 2, 3, 4, 5]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(3), Modifiers::NONE, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::SHIFT, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![3, 4, 5]);

    engine.key(NavigationKey::ArrowUp, Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![3, 4]);

    engine.key(NavigationKey::ArrowUp, Modifiers::SHIFT, &order);
    engine.key(NavigationKey::ArrowUp, Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![2, 3]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(3)));
}

#[test]
fn test_shift_arrow_without_anchor_anchors_at_cursor() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();
    engine.set_last_focused_asset(Some(AssetId(1)));

    engine.key(NavigationKey::ArrowDown, Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![1, 2]);
    assert_eq!(engine.selection_anchor(), Some(AssetId(1)));
}

#[test]
fn test_ctrl_arrow_and_space() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();

    engine.click(AssetId(1), Modifiers::NONE, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::CTRL, &order);
    engine.key(NavigationKey::ArrowDown, Modifiers::CTRL, &order);
    assert_eq!(engine.last_focused_asset(), Some(AssetId(3)));
    assert_eq!(selected(&engine), vec![1]);

    engine.key(NavigationKey::Space, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![1, 3]);
    engine.key(NavigationKey::Space, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![1]);
}

#[test]
fn test_home_end_and_select_all() {
    let order = ids(&[1, 2, 3, 4]);
    let mut engine = SelectionEngine::new();

    engine.key(NavigationKey::End, Modifiers::NONE, &order);
    assert_eq!(selected(&engine), vec![4]);

    engine.key(NavigationKey::Home, Modifiers::SHIFT, &order);
    assert_eq!(selected(&engine), vec![1, 2, 3, 4]);

    engine.select_none();
    engine.key(NavigationKey::SelectAll, Modifiers::CTRL, &order);
    assert_eq!(engine.selected_count(), 4);
}

#[test]
fn test_escape_clears_everything() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();
    engine.click(AssetId(1), Modifiers::NONE, &order);
    engine.click(AssetId(3), Modifiers::SHIFT, &order);

    engine.key(NavigationKey::Escape, Modifiers::NONE, &order);
    assert_eq!(engine.selected_count(), 0);
    assert_eq!(engine.selection_anchor(), None);
    assert_eq!(engine.last_focused_asset(), None);
}

#[test]
fn test_keyboard_mode_tracks_input_device() {
    let order = ids(&[1, 2]);
    let mut engine = SelectionEngine::new();
    assert!(!engine.keyboard_navigation_mode());

    engine.focus();
    assert!(engine.keyboard_navigation_mode());

    engine.pointer_down();
    assert!(!engine.keyboard_navigation_mode());

    engine.key(NavigationKey::Other, Modifiers::NONE, &order);
    assert!(engine.keyboard_navigation_mode());
    assert_eq!(engine.selected_count(), 0);

    engine.click(AssetId(2), Modifiers::NONE, &order);
    assert!(!engine.keyboard_navigation_mode());

    engine.focus();
    engine.blur();
    assert!(!engine.keyboard_navigation_mode());
}

#[test]
fn test_interactions_use_current_context() {
    let order = ids(&[1, 2]);
    let mut engine = SelectionEngine::new();
    engine.set_context(SelectionContext::Search);

    engine.click(AssetId(1), Modifiers::NONE, &order);
    assert_eq!(engine.state().context, SelectionContext::Search);
}

#[tokio::test]
async fn test_subscriber_sees_every_interaction() {
    let order = ids(&[1, 2, 3]);
    let mut engine = SelectionEngine::new();
    let mut rx = engine.subscribe();

    engine.click(AssetId(1), Modifiers::NONE, &order);
    engine.click(AssetId(3), Modifiers::SHIFT, &order);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.selected_count, 1);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.selected_count, 3);
    assert_eq!(second.selection_anchor, Some(AssetId(1)));
}
