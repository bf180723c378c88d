//! Builder configuration

use crate::digest::DEFAULT_BUFFER_SIZE;
use crate::filter::IgnoreRules;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Manifest builder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Upper bound on digests in flight at once
    pub max_concurrent_reads: usize,

    /// Read chunk size in bytes
    pub buffer_size: usize,

    /// Follow symlinks while walking a directory
    pub follow_links: bool,

    /// Platform metadata entries excluded from manifests
    pub ignore: IgnoreRules,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: 16,
            buffer_size: DEFAULT_BUFFER_SIZE,
            follow_links: false,
            ignore: IgnoreRules::default(),
        }
    }
}

impl BuilderConfig {
    /// Load configuration from a TOML file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the builder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reads == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_reads must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
