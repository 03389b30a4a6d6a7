//! Tuning knobs for file mappings.
//!
//! Persisted as `map_config.json` next to the data it applies to.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BlockError, Result};

const CONFIG_FILE: &str = "map_config.json";

/// Expected access pattern, passed to the kernel as a read-ahead hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    #[default]
    Normal,
    Sequential,
    Random,
    WillNeed,
}

impl AccessPattern {
    #[cfg(target_os = "linux")]
    pub(crate) fn fadvise_flag(self) -> Option<libc::c_int> {
        match self {
            AccessPattern::Normal => None,
            AccessPattern::Sequential => Some(libc::POSIX_FADV_SEQUENTIAL),
            AccessPattern::Random => Some(libc::POSIX_FADV_RANDOM),
            AccessPattern::WillNeed => Some(libc::POSIX_FADV_WILLNEED),
        }
    }
}

/// Options applied by `map_file_with`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Pre-fault the whole window at map time.
    pub populate: bool,
    /// Read-ahead hint for the mapped window.
    pub access: AccessPattern,
}

impl MapConfig {
    pub fn with_populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    pub fn with_access(mut self, access: AccessPattern) -> Self {
        self.access = access;
        self
    }

    /// Read config from a directory. Returns None if the file doesn't exist.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| BlockError::io(&path, e))?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config to a directory.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| BlockError::io(&path, e))?;
        Ok(())
    }
}
