//! Physical management of workspace directories.
//!
//! Materializes a workspace from its archive, reports whether a candidate
//! workspace exists or is held by a live session, and removes workspaces.

use crate::archive;
use crate::error::{StoryError, Result};
use crate::lock;
use crate::paths::WorkspacePaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Record of which archive a workspace was extracted from.
///
/// Written after the session lock is acquired so that a crashed workspace
/// found at startup can be traced back to its project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOrigin {
    /// Absolute path of the project archive.
    pub archive: PathBuf,
    /// PID of the process that opened the session.
    pub pid: u32,
    /// When the session was opened (Unix timestamp).
    pub opened_at: u64,
}

/// Workspace directory operations.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    paths: WorkspacePaths,
}

impl WorkspaceStore {
    /// Creates a store over the given layout.
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }

    /// Returns the layout this store works with.
    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn exists(&self, workspace: &Path) -> bool {
        workspace.is_dir()
    }

    /// Returns true if a live process holds the workspace's lock.
    ///
    /// A marker left behind by a crashed process is not locked.
    pub fn is_locked(&self, workspace: &Path) -> bool {
        lock::is_held(&self.paths.lock_path(workspace))
    }

    /// Replaces whatever is at `workspace` with a fresh extraction of `archive`.
    ///
    /// On failure the partially extracted directory is removed before the
    /// error is returned, so it can never be mistaken for a crashed session.
    pub fn initialize_fresh(&self, archive: &Path, workspace: &Path) -> Result<()> {
        info!(workspace = %workspace.display(), "Initializing fresh workspace");

        if workspace.exists() {
            fs::remove_dir_all(workspace)?;
        }
        fs::create_dir_all(workspace)?;

        if let Err(e) = archive::extract(archive, workspace) {
            warn!(workspace = %workspace.display(), error = %e, "Extraction failed, removing partial workspace");
            if let Err(cleanup) = remove_dir_if_present(workspace) {
                warn!(workspace = %workspace.display(), error = %cleanup, "Failed to remove partial workspace");
            }
            return Err(e);
        }

        Ok(())
    }

    /// Deletes a workspace that no live session holds.
    ///
    /// # Errors
    ///
    /// Returns `SessionInUse` if the workspace is locked.
    pub fn discard(&self, workspace: &Path) -> Result<()> {
        if self.is_locked(workspace) {
            return Err(StoryError::SessionInUse {
                workspace: workspace.to_path_buf(),
                pid: lock::read_pid(&self.paths.lock_path(workspace)),
            });
        }
        info!(workspace = %workspace.display(), "Discarding workspace");
        remove_dir_if_present(workspace)?;
        Ok(())
    }

    /// Records which archive the workspace belongs to.
    pub fn write_origin(&self, workspace: &Path, archive: &Path) -> Result<()> {
        let origin = SessionOrigin {
            archive: archive.to_path_buf(),
            pid: std::process::id(),
            opened_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let json = serde_json::to_vec_pretty(&origin)
            .map_err(|e| StoryError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(self.paths.origin_path(workspace), json)?;
        Ok(())
    }

    /// Reads the origin record, if present and well formed.
    pub fn read_origin(&self, workspace: &Path) -> Option<SessionOrigin> {
        let path = self.paths.origin_path(workspace);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(origin) => Some(origin),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed origin record");
                None
            }
        }
    }
}

/// Newest modification time among a workspace directory and its immediate
/// entries.
pub fn last_modified(workspace: &Path) -> Result<SystemTime> {
    let mut newest = fs::metadata(workspace)?.modified()?;
    for entry in fs::read_dir(workspace)? {
        let entry = entry?;
        match entry.metadata().and_then(|m| m.modified()) {
            Ok(mtime) if mtime > newest => newest = mtime,
            Ok(_) => {}
            Err(e) => debug!(path = %entry.path().display(), error = %e, "Skipping entry mtime"),
        }
    }
    Ok(newest)
}

/// Removes a directory tree; a directory that is already gone is not an error.
pub(crate) fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
