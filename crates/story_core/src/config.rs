//! Configuration for workspace layout and archive writing.

use crate::error::{StoryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the directory under the system temp dir that holds workspaces.
pub const DEFAULT_ROOT_DIR: &str = "StoryMode";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace layout.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Archive writing.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| StoryError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| StoryError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoryError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| StoryError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Where workspaces live and what their control files are called.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory holding one subdirectory per open project.
    /// Defaults to `<system temp>/StoryMode`.
    pub root: Option<PathBuf>,

    /// File name of the embedded store inside a workspace (default: `codex.redb`).
    pub store_file: String,

    /// File name of the lock marker (default: `.lock`).
    pub lock_file: String,

    /// File name of the origin record (default: `.session.json`).
    pub origin_file: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            store_file: "codex.redb".to_string(),
            lock_file: ".lock".to_string(),
            origin_file: ".session.json".to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// Returns the configured root, or the default under the system temp dir.
    pub fn resolved_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_ROOT_DIR))
    }
}

/// Archive writing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Deflate compression level (0-9, default: 6).
    pub compression_level: i64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}
