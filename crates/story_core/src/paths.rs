//! Deterministic mapping from project archives to workspace directories.

use crate::config::WorkspaceConfig;
use crate::error::{StoryError, Result};
use std::path::{Path, PathBuf};

/// Workspace path derivation and the names of a workspace's control files.
///
/// Every archive maps to `<root>/<archive file stem>`, so reopening the same
/// archive always lands in the same workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
    store_file: String,
    lock_file: String,
    origin_file: String,
}

impl WorkspacePaths {
    /// Creates a mapping rooted at `root` with the default file names.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::from_config(&WorkspaceConfig {
            root: Some(root.as_ref().to_path_buf()),
            ..WorkspaceConfig::default()
        })
    }

    /// Creates a mapping from configuration.
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self {
            root: config.resolved_root(),
            store_file: config.store_file.clone(),
            lock_file: config.lock_file.clone(),
            origin_file: config.origin_file.clone(),
        }
    }

    /// Root directory that holds all workspaces.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derives the workspace directory for an archive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchivePath` if the path has no file stem.
    pub fn derive(&self, archive: &Path) -> Result<PathBuf> {
        if archive.file_name().is_none() {
            return Err(StoryError::InvalidArchivePath(archive.to_path_buf()));
        }
        match archive.file_stem() {
            Some(stem) if !stem.is_empty() => Ok(self.root.join(stem)),
            _ => Err(StoryError::InvalidArchivePath(archive.to_path_buf())),
        }
    }

    /// Lock marker inside a workspace.
    pub fn lock_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.lock_file)
    }

    /// Embedded store file inside a workspace.
    pub fn store_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.store_file)
    }

    /// Origin record inside a workspace.
    pub fn origin_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.origin_file)
    }

    /// Returns true for top-level workspace entries that never go into an archive.
    pub fn is_control_artifact(&self, name: &str) -> bool {
        name == self.lock_file || name == self.origin_file
    }
}
