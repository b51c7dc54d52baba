//! Orchestrator configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Size and lifetime limits for one cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Maximum number of entries before LRU eviction kicks in.
    pub max_size: usize,
    /// Age in seconds after which an entry is treated as expired.
    pub ttl_secs: u64,
}

impl TierConfig {
    /// Create a tier config.
    pub const fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self { max_size, ttl_secs }
    }

    /// Get the TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Limits for the four tree cache tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tree node tier.
    pub node: TierConfig,
    /// Breadcrumb path tier.
    pub path: TierConfig,
    /// Search result tier.
    pub search: TierConfig,
    /// Per-node metadata tier.
    pub metadata: TierConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            node: TierConfig::new(1000, 300),
            path: TierConfig::new(500, 600),
            search: TierConfig::new(100, 120),
            metadata: TierConfig::new(1000, 300),
        }
    }
}

impl CacheConfig {
    fn tiers(&self) -> [(&'static str, &TierConfig); 4] {
        [
            ("node", &self.node),
            ("path", &self.path),
            ("search", &self.search),
            ("metadata", &self.metadata),
        ]
    }
}

/// Configuration for the bulk operation orchestrator.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Interval between progress polls in milliseconds.
    #[builder(default = "1000")]
    pub poll_interval_ms: u64,

    /// Maximum number of undo entries kept.
    #[builder(default = "50")]
    pub history_capacity: usize,

    /// Consecutive failed polls tolerated before tracking is abandoned.
    #[builder(default = "5")]
    pub max_poll_failures: u32,

    /// Quiet period before a hover-time drop validation is sent.
    #[builder(default = "250")]
    pub drop_validation_debounce_ms: u64,

    /// Number of concurrent loads per preload batch.
    #[builder(default = "5")]
    pub preload_batch_size: usize,

    /// Cache tier limits.
    #[builder(default)]
    pub cache: CacheConfig,
}

impl OrchestratorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == Some(0) {
            return Err("Poll interval must be greater than zero".to_string());
        }
        if self.history_capacity == Some(0) {
            return Err("History capacity must be greater than zero".to_string());
        }
        if self.preload_batch_size == Some(0) {
            return Err("Preload batch size must be greater than zero".to_string());
        }
        if let Some(cache) = &self.cache {
            for (name, tier) in cache.tiers() {
                if tier.max_size == 0 {
                    return Err(format!("Cache tier '{name}' must hold at least one entry"));
                }
            }
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            history_capacity: 50,
            max_poll_failures: 5,
            drop_validation_debounce_ms: 250,
            preload_batch_size: 5,
            cache: CacheConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("assetflow")
            .join("config.toml")
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or from the default location if it exists,
    /// or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_path();
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms must be greater than zero"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::invalid("history_capacity must be greater than zero"));
        }
        if self.preload_batch_size == 0 {
            return Err(ConfigError::invalid("preload_batch_size must be greater than zero"));
        }
        for (name, tier) in self.cache.tiers() {
            if tier.max_size == 0 {
                return Err(ConfigError::invalid(format!(
                    "cache.{name}.max_size must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Drop validation debounce as a duration.
    pub fn drop_validation_debounce(&self) -> Duration {
        Duration::from_millis(self.drop_validation_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::builder()
            .poll_interval_ms(500u64)
            .history_capacity(10usize)
            .build()
            .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.preload_batch_size, 5);
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = OrchestratorConfig::builder().poll_interval_ms(0u64).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_empty_tier() {
        let mut cache = CacheConfig::default();
        cache.search.max_size = 0;
        let result = OrchestratorConfig::builder().cache(cache).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.cache.node.max_size, 1000);
        assert!(config.validate().is_ok());
    }
}
