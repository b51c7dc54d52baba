//! Bulk operation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use assetflow_core::AssetId;

/// Backend-issued identifier of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl OperationId {
    /// Create an id from a backend token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of bulk operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum OperationType {
    Move,
    Delete,
    Export,
    Classify,
    Rename,
}

impl OperationType {
    /// Past-tense verb for summaries.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Move => "Moved",
            Self::Delete => "Deleted",
            Self::Export => "Exported",
            Self::Classify => "Classified",
            Self::Rename => "Renamed",
        }
    }

    /// Whether the operation changes the hierarchy.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Export)
    }
}

/// Options for moving assets under a new parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOptions {
    /// Destination folder.
    pub new_parent_id: AssetId,
    /// Reject moves that would break hierarchy rules.
    #[serde(default = "default_true")]
    pub validate_hierarchy: bool,
    /// Skip conflicting items instead of failing validation.
    #[serde(default)]
    pub skip_conflicts: bool,
}

impl MoveOptions {
    /// Move into `new_parent_id` with hierarchy validation on.
    pub fn to(new_parent_id: AssetId) -> Self {
        Self {
            new_parent_id,
            validate_hierarchy: true,
            skip_conflicts: false,
        }
    }
}

/// Options for deleting assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Delete even if the backend would normally refuse.
    #[serde(default)]
    pub force_delete: bool,
    /// Delete folder contents as well.
    #[serde(default)]
    pub delete_children: bool,
    /// Skip protected assets instead of failing validation.
    #[serde(default)]
    pub skip_protected: bool,
}

/// Output format for exports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Xml,
}

/// Options for exporting assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Include folder contents.
    #[serde(default)]
    pub include_children: bool,
    /// Include per-node metadata.
    #[serde(default)]
    pub include_metadata: bool,
    /// Include configuration payloads.
    #[serde(default)]
    pub include_configuration: bool,
}

/// Options for classifying assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyOptions {
    /// New classification label. None clears the classification.
    pub new_classification: Option<String>,
    /// Apply to folder contents as well.
    #[serde(default)]
    pub apply_to_children: bool,
}

/// Options for renaming assets.
///
/// `pattern` replaces the base name; `prefix` and `suffix` are added around
/// it. With `preserve_extension` the part after the last dot is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOptions {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub preserve_extension: bool,
}

impl RenameOptions {
    /// Rename to exactly `name`.
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            pattern: Some(name.into()),
            ..Default::default()
        }
    }

    /// Compute the new name for an asset currently called `current`.
    pub fn apply(&self, current: &str) -> String {
        let (stem, extension) = match current.rsplit_once('.') {
            Some((stem, ext)) if self.preserve_extension && !stem.is_empty() => (stem, Some(ext)),
            _ => (current, None),
        };

        let base = self.pattern.as_deref().unwrap_or(stem);
        let mut name = format!(
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            base,
            self.suffix.as_deref().unwrap_or("")
        );
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(ext);
        }
        name
    }

    /// Whether applying these options changes anything.
    pub fn is_noop(&self) -> bool {
        self.pattern.as_deref().is_none_or(str::is_empty)
            && self.prefix.as_deref().is_none_or(str::is_empty)
            && self.suffix.as_deref().is_none_or(str::is_empty)
    }
}

/// Per-type operation options. The variant determines the operation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum OperationOptions {
    Move(MoveOptions),
    Delete(DeleteOptions),
    Export(ExportOptions),
    Classify(ClassifyOptions),
    Rename(RenameOptions),
}

impl OperationOptions {
    /// The operation type these options belong to.
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Move(_) => OperationType::Move,
            Self::Delete(_) => OperationType::Delete,
            Self::Export(_) => OperationType::Export,
            Self::Classify(_) => OperationType::Classify,
            Self::Rename(_) => OperationType::Rename,
        }
    }

    /// Check option values that can be rejected without asking the backend.
    pub fn validate(&self, asset_ids: &[AssetId]) -> Result<(), String> {
        match self {
            Self::Move(options) => {
                if asset_ids.contains(&options.new_parent_id) {
                    return Err(format!(
                        "Cannot move asset {} into itself",
                        options.new_parent_id
                    ));
                }
            }
            Self::Classify(options) => {
                if options
                    .new_classification
                    .as_deref()
                    .is_some_and(|c| c.trim().is_empty())
                {
                    return Err("Classification label cannot be blank".to_string());
                }
            }
            Self::Rename(options) => {
                if options.is_noop() {
                    return Err("Rename needs a pattern, prefix or suffix".to_string());
                }
            }
            Self::Delete(_) | Self::Export(_) => {}
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// A request to run an operation, before the backend has accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationRequest {
    /// Target assets. De-duplicated at submission.
    pub asset_ids: Vec<AssetId>,
    /// Operation options.
    pub options: OperationOptions,
}

impl BulkOperationRequest {
    /// Create a request.
    pub fn new(asset_ids: Vec<AssetId>, options: OperationOptions) -> Self {
        Self { asset_ids, options }
    }

    /// The operation type.
    pub fn operation_type(&self) -> OperationType {
        self.options.operation_type()
    }
}

/// An operation accepted by the backend. Immutable; a retry is a new operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    pub id: OperationId,
    pub operation_type: OperationType,
    /// Ordered, de-duplicated, never empty.
    pub asset_ids: Vec<AssetId>,
    pub options: OperationOptions,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_apply() {
        let options = RenameOptions {
            prefix: Some("old_".to_string()),
            preserve_extension: true,
            ..Default::default()
        };
        assert_eq!(options.apply("config.xml"), "old_config.xml");

        let options = RenameOptions {
            pattern: Some("pump".to_string()),
            suffix: Some("-2".to_string()),
            preserve_extension: true,
            ..Default::default()
        };
        assert_eq!(options.apply("motor.cfg"), "pump-2.cfg");
        assert_eq!(options.apply("noext"), "pump-2");

        let options = RenameOptions::exact("Line A");
        assert_eq!(options.apply("line.a"), "Line A");
    }

    #[test]
    fn test_rename_hidden_file_keeps_name() {
        let options = RenameOptions {
            suffix: Some("_bak".to_string()),
            preserve_extension: true,
            ..Default::default()
        };
        assert_eq!(options.apply(".profile"), ".profile_bak");
    }

    #[test]
    fn test_validate_move_into_self() {
        let options = OperationOptions::Move(MoveOptions::to(AssetId(2)));
        assert!(options.validate(&[AssetId(1), AssetId(2)]).is_err());
        assert!(options.validate(&[AssetId(1)]).is_ok());
    }

    #[test]
    fn test_validate_rename_noop() {
        let options = OperationOptions::Rename(RenameOptions::default());
        assert!(options.validate(&[AssetId(1)]).is_err());
    }

    #[test]
    fn test_options_tagging() {
        let options = OperationOptions::Delete(DeleteOptions {
            force_delete: true,
            ..Default::default()
        });
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["type"], "Delete");
        assert_eq!(json["options"]["force_delete"], true);
        assert_eq!(options.operation_type(), OperationType::Delete);
    }

    #[test]
    fn test_operation_type_parse() {
        assert_eq!("move".parse::<OperationType>().unwrap(), OperationType::Move);
        assert!(!OperationType::Export.is_mutating());
    }
}
