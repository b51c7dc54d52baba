//! Translating history entries into inverse and replay requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use assetflow_core::{AssetId, TreeNode};

use crate::error::InversionError;
use crate::history::{HistoryEntry, HistoryKind};
use crate::operation::{
    BulkOperationRequest, ClassifyOptions, DeleteOptions, MoveOptions, OperationOptions,
    RenameOptions,
};

/// State of one asset captured before an operation ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset_id: AssetId,
    /// The node as it was cached. None when it was not in the cache.
    #[serde(default)]
    pub node: Option<TreeNode>,
}

impl AssetSnapshot {
    pub fn new(asset_id: AssetId, node: Option<TreeNode>) -> Self {
        Self { asset_id, node }
    }
}

/// Build the requests that revert `entry`.
///
/// Assets that shared a parent or classification are reverted together, so
/// undoing a bulk move onto one folder of assets from two folders yields two
/// moves. An entry that changed nothing (an export) inverts to no requests.
pub fn invert(entry: &HistoryEntry) -> Result<Vec<BulkOperationRequest>, InversionError> {
    match entry.kind {
        HistoryKind::Move => {
            let mut groups = Vec::new();
            for (asset_id, node) in originals(entry)? {
                let parent = node.parent_id.ok_or_else(|| {
                    InversionError::not_reversible(format!("asset {asset_id} had no parent"))
                })?;
                push_grouped(&mut groups, parent, asset_id);
            }
            Ok(groups
                .into_iter()
                .map(|(parent, ids)| {
                    BulkOperationRequest::new(ids, OperationOptions::Move(MoveOptions::to(parent)))
                })
                .collect())
        }
        HistoryKind::Classify => {
            let mut groups = Vec::new();
            for (asset_id, node) in originals(entry)? {
                push_grouped(&mut groups, node.classification.clone(), asset_id);
            }
            Ok(groups
                .into_iter()
                .map(|(classification, ids)| {
                    let options = ClassifyOptions {
                        new_classification: classification.map(|c| c.to_string()),
                        apply_to_children: false,
                    };
                    BulkOperationRequest::new(ids, OperationOptions::Classify(options))
                })
                .collect())
        }
        HistoryKind::Rename => Ok(originals(entry)?
            .into_iter()
            .map(|(asset_id, node)| {
                BulkOperationRequest::new(
                    vec![asset_id],
                    OperationOptions::Rename(RenameOptions::exact(node.name.as_str())),
                )
            })
            .collect()),
        HistoryKind::Create => Ok(vec![BulkOperationRequest::new(
            entry.asset_ids.clone(),
            OperationOptions::Delete(DeleteOptions::default()),
        )]),
        HistoryKind::Export => Ok(Vec::new()),
        HistoryKind::Delete => Err(InversionError::not_reversible(
            "deleted assets cannot be restored",
        )),
        HistoryKind::Update => Err(InversionError::not_reversible(
            "property edits are not tracked for undo",
        )),
        HistoryKind::Batch => Err(InversionError::not_reversible(
            "mixed batches must be undone step by step",
        )),
    }
}

/// Build the requests that re-apply `entry` after it was undone.
///
/// Each recorded part stores the request it ran; parts with identical
/// options are merged back into one request.
pub fn replay(entry: &HistoryEntry) -> Result<Vec<BulkOperationRequest>, InversionError> {
    if matches!(entry.kind, HistoryKind::Create | HistoryKind::Update) {
        return Err(InversionError::not_reversible(format!(
            "{} entries cannot be replayed",
            entry.kind
        )));
    }

    let mut groups: Vec<(OperationOptions, Vec<AssetId>)> = Vec::new();
    for (_, new) in entry.parts() {
        let request: BulkOperationRequest = parse(new)?;
        for asset_id in request.asset_ids {
            push_grouped(&mut groups, request.options.clone(), asset_id);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(options, ids)| BulkOperationRequest::new(ids, options))
        .collect())
}

/// The original node of every asset in the entry, in entry order.
fn originals(entry: &HistoryEntry) -> Result<Vec<(AssetId, TreeNode)>, InversionError> {
    let mut snapshots = Vec::new();
    for (original, _) in entry.parts() {
        match original {
            Value::Array(items) => {
                for item in items {
                    snapshots.push(parse::<AssetSnapshot>(item)?);
                }
            }
            other => snapshots.push(parse::<AssetSnapshot>(other)?),
        }
    }

    entry
        .asset_ids
        .iter()
        .map(|&asset_id| {
            snapshots
                .iter()
                .find(|s| s.asset_id == asset_id)
                .and_then(|s| s.node.clone())
                .map(|node| (asset_id, node))
                .ok_or(InversionError::MissingOriginal { asset_id })
        })
        .collect()
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, InversionError> {
    serde_json::from_value(value.clone()).map_err(|e| InversionError::Malformed {
        message: e.to_string(),
    })
}

fn push_grouped<K: PartialEq>(groups: &mut Vec<(K, Vec<AssetId>)>, key: K, asset_id: AssetId) {
    match groups.iter_mut().find(|(k, _)| *k == key) {
        Some((_, ids)) => ids.push(asset_id),
        None => groups.push((key, vec![asset_id])),
    }
}
