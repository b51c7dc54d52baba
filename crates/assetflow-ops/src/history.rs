//! Bounded undo/redo history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use assetflow_core::AssetId;

use crate::operation::OperationType;

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum HistoryKind {
    Move,
    Delete,
    Export,
    Classify,
    Rename,
    /// A single asset was created.
    Create,
    /// A single asset's properties were edited.
    Update,
    /// A group of entries of different kinds.
    Batch,
}

impl From<OperationType> for HistoryKind {
    fn from(operation_type: OperationType) -> Self {
        match operation_type {
            OperationType::Move => Self::Move,
            OperationType::Delete => Self::Delete,
            OperationType::Export => Self::Export,
            OperationType::Classify => Self::Classify,
            OperationType::Rename => Self::Rename,
        }
    }
}

/// One undo step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Assigned by the manager on record.
    pub id: u64,
    pub kind: HistoryKind,
    pub description: String,
    pub asset_ids: Vec<AssetId>,
    /// State before the change, used to build the inverse.
    pub original_data: Value,
    /// State after the change, used to redo.
    pub new_data: Value,
    pub timestamp: DateTime<Utc>,
    /// True when this step stands for several underlying mutations.
    pub grouped: bool,
}

impl HistoryEntry {
    /// Create an ungrouped entry.
    pub fn new(
        kind: HistoryKind,
        description: impl Into<String>,
        asset_ids: Vec<AssetId>,
        original_data: Value,
        new_data: Value,
    ) -> Self {
        Self {
            id: 0,
            kind,
            description: description.into(),
            asset_ids,
            original_data,
            new_data,
            timestamp: Utc::now(),
            grouped: false,
        }
    }

    /// Split a grouped entry's data back into per-mutation parts.
    ///
    /// Ungrouped entries yield a single part.
    pub fn parts(&self) -> Vec<(&Value, &Value)> {
        match (self.grouped, &self.original_data, &self.new_data) {
            (true, Value::Array(originals), Value::Array(news)) => {
                originals.iter().zip(news.iter()).collect()
            }
            _ => vec![(&self.original_data, &self.new_data)],
        }
    }
}

/// Undo and redo stacks with a fixed capacity.
///
/// Recording beyond capacity drops the oldest entry. Recording anything
/// new discards the redo stack.
#[derive(Debug)]
pub struct HistoryManager {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryManager {
    /// Create a history keeping at most `capacity` undo steps.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            undo: VecDeque::with_capacity(capacity.min(1000)),
            redo: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    /// Record an entry. Returns the assigned id.
    pub fn record(&mut self, mut entry: HistoryEntry) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        entry.id = id;

        if self.undo.len() >= self.capacity {
            if let Some(evicted) = self.undo.pop_front() {
                tracing::debug!(id = evicted.id, "history full, dropping oldest entry");
            }
        }
        self.undo.push_back(entry);
        self.redo.clear();

        id
    }

    /// Collapse several entries into one undo step.
    ///
    /// The data of the parts is kept as parallel arrays in `original_data`
    /// and `new_data`. The kind is shared by all parts, or `Batch` when they
    /// differ. Returns None for an empty group.
    pub fn record_grouped(
        &mut self,
        entries: Vec<HistoryEntry>,
        description: impl Into<String>,
    ) -> Option<u64> {
        let mut kinds = entries.iter().map(|e| e.kind).unique();
        let first = kinds.next()?;
        let kind = if kinds.next().is_some() {
            HistoryKind::Batch
        } else {
            first
        };

        let asset_ids = entries
            .iter()
            .flat_map(|e| e.asset_ids.iter().copied())
            .unique()
            .collect();
        let (originals, news): (Vec<Value>, Vec<Value>) = entries
            .into_iter()
            .map(|e| (e.original_data, e.new_data))
            .unzip();

        let mut grouped = HistoryEntry::new(
            kind,
            description,
            asset_ids,
            Value::Array(originals),
            Value::Array(news),
        );
        grouped.grouped = true;

        Some(self.record(grouped))
    }

    /// Take the most recent entry for undoing. It moves to the redo stack.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo.pop_back()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Take the most recently undone entry for redoing. It moves back to
    /// the undo stack without clearing the remaining redo entries.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo.pop()?;
        if self.undo.len() >= self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(entry.clone());
        Some(entry)
    }

    /// Drop the most recent entry without making it redoable.
    pub fn discard_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop_back()
    }

    /// Drop the most recently undone entry.
    pub fn discard_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// The entry `undo` would return.
    pub fn peek_undo(&self) -> Option<&HistoryEntry> {
        self.undo.back()
    }

    /// The entry `redo` would return.
    pub fn peek_redo(&self) -> Option<&HistoryEntry> {
        self.redo.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo steps.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    /// Check if there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Maximum number of undo steps.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Undo entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter()
    }
}
