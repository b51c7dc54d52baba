//! In-memory backend used by the `simulate` command and tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use assetflow_cache::{HierarchyProvider, LoadError};
use assetflow_core::{AssetId, TreeNode};

use crate::backend::{AssetBackend, ValidationIssue, ValidationResult};
use crate::conflict::{Conflict, ConflictKind};
use crate::error::BackendError;
use crate::operation::{OperationId, OperationOptions};
use crate::progress::{BulkOperationProgress, OperationItemError, OperationStatus};

/// Calls received by a [`SimulatedBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub submit: usize,
    pub progress: usize,
    pub cancel: usize,
    pub validate: usize,
}

#[derive(Debug)]
struct SimOperation {
    asset_ids: Vec<AssetId>,
    options: OperationOptions,
    progress: BulkOperationProgress,
    cancel_requested: bool,
    /// Fixed responses returned instead of simulating execution.
    script: VecDeque<Result<BulkOperationProgress, BackendError>>,
}

#[derive(Debug, Default)]
struct SimState {
    nodes: BTreeMap<AssetId, TreeNode>,
    operations: HashMap<OperationId, SimOperation>,
    next_operation: u64,
    failing_items: HashSet<AssetId>,
    submit_failures: VecDeque<Option<BackendError>>,
    next_script: Option<VecDeque<Result<BulkOperationProgress, BackendError>>>,
    calls: CallCounts,
}

/// A backend that executes operations against an in-memory hierarchy.
///
/// Each progress poll advances an operation by one step: `pending`, then
/// `validating`, then `processing` a fixed number of items per poll.
/// Mutations are applied item by item, so a cancelled operation leaves the
/// items processed so far changed.
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
    items_per_poll: u64,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SimulatedBackend {
    /// Create a backend holding `nodes`.
    pub fn new(nodes: impl IntoIterator<Item = TreeNode>) -> Self {
        let backend = Self {
            state: Mutex::new(SimState::default()),
            items_per_poll: 1,
        };
        {
            let mut state = backend.lock();
            for node in nodes {
                state.nodes.insert(node.id, node);
            }
            recount_children(&mut state.nodes);
        }
        backend
    }

    /// A sample hierarchy: a root, `folders` folders below it, and
    /// `devices_per_folder` devices in each folder.
    ///
    /// The root is asset 1; folders are numbered from 2 and devices follow.
    pub fn sample(folders: u64, devices_per_folder: u64) -> Self {
        let root = AssetId(1);
        let mut nodes = vec![TreeNode::folder(root, "Site", None)];
        let mut next = 2 + folders;
        for f in 0..folders {
            let folder = AssetId(2 + f);
            nodes.push(TreeNode::folder(folder, format!("Area {}", f + 1), Some(root)));
            for d in 0..devices_per_folder {
                nodes.push(TreeNode::device(
                    AssetId(next),
                    format!("device-{}-{}", f + 1, d + 1),
                    Some(folder),
                ));
                next += 1;
            }
        }
        Self::new(nodes)
    }

    /// Process `items` items per progress poll.
    pub fn with_items_per_poll(mut self, items: u64) -> Self {
        self.items_per_poll = items.max(1);
        self
    }

    /// Make processing of `asset_id` fail as a skipped item.
    pub fn fail_item(&self, asset_id: AssetId) {
        self.lock().failing_items.insert(asset_id);
    }

    /// Mark an asset as protected.
    pub fn protect(&self, asset_id: AssetId) {
        if let Some(node) = self.lock().nodes.get_mut(&asset_id) {
            node.protected = true;
        }
    }

    /// Fail the next submission with `error`.
    pub fn fail_next_submit(&self, error: BackendError) {
        self.fail_submit_after(0, error);
    }

    /// Accept the next `accepted` submissions, then fail one with `error`.
    pub fn fail_submit_after(&self, accepted: usize, error: BackendError) {
        let mut state = self.lock();
        state.submit_failures.extend(std::iter::repeat_n(None, accepted));
        state.submit_failures.push_back(Some(error));
    }

    /// Answer progress polls of the next submitted operation from `script`.
    ///
    /// Responses are returned in order; the last one repeats once the
    /// script runs out. The operation id of each snapshot is overwritten.
    pub fn script_next(&self, script: Vec<Result<BulkOperationProgress, BackendError>>) {
        self.lock().next_script = Some(script.into());
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Current state of a node.
    pub fn node(&self, id: AssetId) -> Option<TreeNode> {
        self.lock().nodes.get(&id).cloned()
    }

    /// Ids of all nodes, ascending.
    pub fn node_ids(&self) -> Vec<AssetId> {
        self.lock().nodes.keys().copied().collect()
    }

    /// Direct children of `id`, ascending by id.
    pub fn children(&self, id: AssetId) -> Vec<TreeNode> {
        children_of(&self.lock().nodes, id)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AssetBackend for SimulatedBackend {
    async fn submit_operation(
        &self,
        asset_ids: &[AssetId],
        options: &OperationOptions,
    ) -> Result<OperationId, BackendError> {
        let mut state = self.lock();
        state.calls.submit += 1;

        if let Some(Some(error)) = state.submit_failures.pop_front() {
            return Err(error);
        }

        state.next_operation += 1;
        let id = OperationId::new(format!("op-{}", state.next_operation));
        let script = state.next_script.take().unwrap_or_default();

        state.operations.insert(
            id.clone(),
            SimOperation {
                asset_ids: asset_ids.to_vec(),
                options: options.clone(),
                progress: BulkOperationProgress::pending(id.clone(), asset_ids.len() as u64),
                cancel_requested: false,
                script,
            },
        );
        Ok(id)
    }

    async fn get_operation_progress(
        &self,
        operation_id: &OperationId,
    ) -> Result<BulkOperationProgress, BackendError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.calls.progress += 1;

        let operation =
            state
                .operations
                .get_mut(operation_id)
                .ok_or_else(|| BackendError::NotFound {
                    id: operation_id.clone(),
                })?;

        if !operation.script.is_empty() {
            let response = if operation.script.len() > 1 {
                operation.script.pop_front()
            } else {
                operation.script.front().cloned()
            };
            return match response {
                Some(Ok(mut progress)) => {
                    progress.operation_id = operation_id.clone();
                    Ok(progress)
                }
                Some(Err(e)) => Err(e),
                None => Err(BackendError::transport("empty script")),
            };
        }

        advance(
            operation,
            &mut state.nodes,
            &state.failing_items,
            self.items_per_poll,
        );
        Ok(operation.progress.clone())
    }

    async fn cancel_operation(&self, operation_id: &OperationId) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.cancel += 1;

        let operation =
            state
                .operations
                .get_mut(operation_id)
                .ok_or_else(|| BackendError::NotFound {
                    id: operation_id.clone(),
                })?;
        operation.cancel_requested = true;
        Ok(())
    }

    async fn validate_bulk_move(
        &self,
        asset_ids: &[AssetId],
        new_parent_id: AssetId,
    ) -> Result<ValidationResult, BackendError> {
        let mut state = self.lock();
        state.calls.validate += 1;
        Ok(validate_move(&state.nodes, asset_ids, new_parent_id))
    }
}

#[async_trait]
impl HierarchyProvider for SimulatedBackend {
    async fn load_node(&self, id: AssetId) -> Result<TreeNode, LoadError> {
        self.node(id)
            .ok_or_else(|| LoadError::new(id, "no such asset"))
    }

    async fn load_path(&self, id: AssetId) -> Result<Vec<TreeNode>, LoadError> {
        let state = self.lock();
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let node = state
                .nodes
                .get(&cursor)
                .ok_or_else(|| LoadError::new(id, format!("broken path at {cursor}")))?;
            if path.len() > state.nodes.len() {
                return Err(LoadError::new(id, "cycle in hierarchy"));
            }
            current = node.parent_id;
            path.push(node.clone());
        }
        path.reverse();
        Ok(path)
    }

    async fn load_children(&self, id: AssetId) -> Result<Vec<TreeNode>, LoadError> {
        let state = self.lock();
        if !state.nodes.contains_key(&id) {
            return Err(LoadError::new(id, "no such asset"));
        }
        Ok(children_of(&state.nodes, id))
    }
}

/// Advance an operation by one poll.
fn advance(
    operation: &mut SimOperation,
    nodes: &mut BTreeMap<AssetId, TreeNode>,
    failing: &HashSet<AssetId>,
    items_per_poll: u64,
) {
    let progress = &mut operation.progress;
    if progress.is_terminal() {
        return;
    }
    if operation.cancel_requested {
        progress.status = OperationStatus::Cancelled;
        progress.current_item = None;
        progress.processing_rate = 0.0;
        return;
    }

    match progress.status {
        OperationStatus::Pending => progress.status = OperationStatus::Validating,
        OperationStatus::Validating => {
            let blocking = validate_operation(nodes, &operation.asset_ids, &operation.options);
            if blocking.is_empty() {
                progress.status = OperationStatus::Processing;
            } else {
                progress.status = OperationStatus::Failed;
                progress.errors = blocking;
            }
        }
        OperationStatus::Processing => {
            let start = progress.processed_items as usize;
            let end = (start + items_per_poll as usize).min(operation.asset_ids.len());
            for &asset_id in &operation.asset_ids[start..end] {
                let name = nodes
                    .get(&asset_id)
                    .map(|n| n.name.to_string())
                    .unwrap_or_default();
                let result = if failing.contains(&asset_id) {
                    Err("simulated failure".to_string())
                } else {
                    apply(nodes, asset_id, &operation.options)
                };
                if let Err(message) = result {
                    progress.failed_items += 1;
                    progress
                        .errors
                        .push(OperationItemError::item(asset_id, name, message));
                }
                progress.processed_items += 1;
            }

            progress.processing_rate = items_per_poll as f64;
            progress.current_item = operation
                .asset_ids
                .get(end)
                .and_then(|id| nodes.get(id))
                .map(|n| n.name.to_string());
            if progress.processed_items >= progress.total_items {
                progress.status = OperationStatus::Completed;
                progress.current_item = None;
                progress.processing_rate = 0.0;
            }
        }
        OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled => {}
    }
}

/// Blocking validation errors for an operation.
fn validate_operation(
    nodes: &BTreeMap<AssetId, TreeNode>,
    asset_ids: &[AssetId],
    options: &OperationOptions,
) -> Vec<OperationItemError> {
    match options {
        OperationOptions::Move(move_options) => {
            if !move_options.validate_hierarchy {
                return Vec::new();
            }
            let result = validate_move(nodes, asset_ids, move_options.new_parent_id);
            let skippable = move_options.skip_conflicts && result.conflicts_skippable();
            if result.is_valid || skippable {
                return Vec::new();
            }
            result
                .errors
                .into_iter()
                .map(|issue| {
                    let id = issue.asset_id.unwrap_or(move_options.new_parent_id);
                    OperationItemError::blocking(id, name_of(nodes, id), issue.message)
                })
                .collect()
        }
        OperationOptions::Delete(delete) if !delete.force_delete && !delete.skip_protected => {
            asset_ids
                .iter()
                .filter_map(|id| nodes.get(id))
                .filter(|node| node.protected)
                .map(|node| {
                    OperationItemError::blocking(node.id, node.name.as_str(), "Asset is protected")
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn validate_move(
    nodes: &BTreeMap<AssetId, TreeNode>,
    asset_ids: &[AssetId],
    target: AssetId,
) -> ValidationResult {
    let mut result = ValidationResult::valid();

    match nodes.get(&target) {
        Some(node) if node.is_folder() => {}
        Some(_) => result.errors.push(ValidationIssue::for_asset(
            target,
            "Target is not a folder",
        )),
        None => result.errors.push(ValidationIssue::for_asset(
            target,
            "Target does not exist",
        )),
    }

    for &asset_id in asset_ids {
        let Some(node) = nodes.get(&asset_id) else {
            result
                .errors
                .push(ValidationIssue::for_asset(asset_id, "Asset does not exist"));
            continue;
        };

        let conflict = if asset_id == target || is_ancestor(nodes, asset_id, target) {
            Some(ConflictKind::TargetIsDescendant)
        } else if node.parent_id == Some(target) {
            Some(ConflictKind::SameParent)
        } else if node.protected {
            Some(ConflictKind::Protected)
        } else if children_of(nodes, target)
            .iter()
            .any(|sibling| sibling.name == node.name)
        {
            Some(ConflictKind::NameExists)
        } else {
            None
        };

        if let Some(kind) = conflict {
            if kind == ConflictKind::SameParent {
                result
                    .warnings
                    .push(ValidationIssue::for_asset(asset_id, kind.to_string()));
            } else {
                result
                    .errors
                    .push(ValidationIssue::for_asset(asset_id, kind.to_string()));
            }
            result.conflicts.push(Conflict::new(asset_id, target, kind));
        }
    }

    result.is_valid = result.errors.is_empty();
    result
}

/// Apply one item of an operation.
fn apply(
    nodes: &mut BTreeMap<AssetId, TreeNode>,
    asset_id: AssetId,
    options: &OperationOptions,
) -> Result<(), String> {
    if !nodes.contains_key(&asset_id) {
        return Err("Asset does not exist".to_string());
    }

    match options {
        OperationOptions::Move(move_options) => {
            let target = move_options.new_parent_id;
            if asset_id == target || is_ancestor(nodes, asset_id, target) {
                return Err("Cannot move a folder into itself".to_string());
            }
            if let Some(node) = nodes.get_mut(&asset_id) {
                node.parent_id = Some(target);
            }
        }
        OperationOptions::Delete(delete) => {
            let node_protected = nodes.get(&asset_id).is_some_and(|n| n.protected);
            if node_protected && !delete.force_delete {
                return Err("Asset is protected".to_string());
            }
            let descendants = descendants_of(nodes, asset_id);
            if !descendants.is_empty() && !delete.delete_children {
                return Err("Folder is not empty".to_string());
            }
            for id in descendants {
                nodes.remove(&id);
            }
            nodes.remove(&asset_id);
        }
        OperationOptions::Classify(classify) => {
            let mut targets = vec![asset_id];
            if classify.apply_to_children {
                targets.extend(descendants_of(nodes, asset_id));
            }
            for id in targets {
                if let Some(node) = nodes.get_mut(&id) {
                    node.classification = classify.new_classification.as_deref().map(Into::into);
                }
            }
        }
        OperationOptions::Rename(rename) => {
            if let Some(node) = nodes.get_mut(&asset_id) {
                node.name = rename.apply(&node.name).into();
            }
        }
        OperationOptions::Export(_) => {}
    }

    recount_children(nodes);
    Ok(())
}

fn name_of(nodes: &BTreeMap<AssetId, TreeNode>, id: AssetId) -> String {
    nodes
        .get(&id)
        .map(|n| n.name.to_string())
        .unwrap_or_else(|| id.to_string())
}

fn children_of(nodes: &BTreeMap<AssetId, TreeNode>, id: AssetId) -> Vec<TreeNode> {
    nodes
        .values()
        .filter(|n| n.parent_id == Some(id))
        .cloned()
        .collect()
}

fn descendants_of(nodes: &BTreeMap<AssetId, TreeNode>, id: AssetId) -> Vec<AssetId> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
        for child in nodes.values().filter(|n| n.parent_id == Some(current)) {
            if child.id != id && !found.contains(&child.id) {
                found.push(child.id);
                queue.push_back(child.id);
            }
        }
    }
    found
}

/// Whether `ancestor` is above `id` in the hierarchy.
fn is_ancestor(nodes: &BTreeMap<AssetId, TreeNode>, ancestor: AssetId, id: AssetId) -> bool {
    let mut current = nodes.get(&id).and_then(|n| n.parent_id);
    let mut steps = 0;
    while let Some(cursor) = current {
        if cursor == ancestor {
            return true;
        }
        steps += 1;
        if steps > nodes.len() {
            return false;
        }
        current = nodes.get(&cursor).and_then(|n| n.parent_id);
    }
    false
}

fn recount_children(nodes: &mut BTreeMap<AssetId, TreeNode>) {
    let mut counts: HashMap<AssetId, usize> = HashMap::new();
    for parent in nodes.values().filter_map(|n| n.parent_id) {
        *counts.entry(parent).or_default() += 1;
    }
    for node in nodes.values_mut() {
        node.child_count = counts.get(&node.id).copied().unwrap_or(0);
    }
}
