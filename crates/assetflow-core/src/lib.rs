//! Core types and configuration for assetflow.
//!
//! This crate provides the fundamental data structures shared by the
//! selection, cache and operation crates: asset identifiers, hierarchy
//! nodes, and the orchestrator configuration.

mod asset;
mod config;
mod error;

pub use asset::{AssetId, AssetKind, TreeNode};
pub use config::{CacheConfig, OrchestratorConfig, OrchestratorConfigBuilder, TierConfig};
pub use error::ConfigError;
