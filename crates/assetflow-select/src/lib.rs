//! Multi-select selection engine.
//!
//! Tracks the selected assets, the keyboard cursor and the range anchor,
//! and applies the file-explorer multi-select convention (plain, Ctrl/Cmd
//! and Shift clicks, arrow-key navigation) against an externally supplied
//! display order.

mod engine;
mod interaction;
mod state;

pub use engine::{SelectionEngine, SELECTION_CHANNEL_SIZE};
pub use interaction::{range_between, Modifiers, NavigationKey};
pub use state::{SelectionChange, SelectionContext, SelectionState};
