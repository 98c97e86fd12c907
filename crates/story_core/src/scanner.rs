//! Startup sweep over all workspaces for crashed sessions.
//!
//! Every subdirectory of the workspace root is classified as:
//! 1. **live**: its lock marker is held by a running process (left alone)
//! 2. **recoverable**: a stale lock marker or an embedded store file remains
//! 3. **garbage**: neither marker nor store (deleted)

use crate::error::Result;
use crate::lock;
use crate::paths::WorkspacePaths;
use crate::workspace::{last_modified, remove_dir_if_present, WorkspaceStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// A workspace left behind by a session that ended without an orderly close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySession {
    /// Workspace directory.
    pub path: PathBuf,
    /// Newest modification time found in the workspace.
    pub last_modified: SystemTime,
    /// Archive the workspace was opened from, if the origin record survived.
    pub origin: Option<PathBuf>,
}

/// Report from a crash scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Recovery candidates, most recently modified first.
    pub sessions: Vec<RecoverySession>,

    /// Workspaces held by live sessions (skipped).
    pub live: Vec<PathBuf>,

    /// Garbage workspaces that were deleted.
    pub removed: Vec<PathBuf>,

    /// Errors encountered during the scan (non-fatal).
    pub errors: Vec<String>,
}

impl ScanReport {
    /// The candidate to offer in a single "resume last crash" prompt.
    pub fn most_recent(&self) -> Option<&RecoverySession> {
        self.sessions.first()
    }
}

/// Scans the workspace root for crashed sessions.
pub struct CrashScanner {
    store: WorkspaceStore,
}

impl CrashScanner {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self {
            store: WorkspaceStore::new(paths),
        }
    }

    /// Classifies every workspace under the root and deletes garbage.
    ///
    /// A missing root yields an empty report.
    pub fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let root = self.store.paths().root();

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            self.classify(&entry.path(), &mut report);
        }

        report
            .sessions
            .sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

        info!(
            recoverable = report.sessions.len(),
            live = report.live.len(),
            removed = report.removed.len(),
            "Crash scan finished"
        );
        Ok(report)
    }

    fn classify(&self, dir: &Path, report: &mut ScanReport) {
        let paths = self.store.paths();
        let lock_path = paths.lock_path(dir);

        let recoverable = if lock_path.exists() {
            if lock::is_held(&lock_path) {
                debug!(workspace = %dir.display(), "Workspace held by a live session");
                report.live.push(dir.to_path_buf());
                return;
            }
            true
        } else {
            paths.store_path(dir).exists()
        };

        if recoverable {
            let last_modified = match last_modified(dir) {
                Ok(mtime) => mtime,
                Err(e) => {
                    report
                        .errors
                        .push(format!("cannot stat {}: {}", dir.display(), e));
                    SystemTime::UNIX_EPOCH
                }
            };
            debug!(workspace = %dir.display(), "Found recoverable workspace");
            report.sessions.push(RecoverySession {
                path: dir.to_path_buf(),
                last_modified,
                origin: self.store.read_origin(dir).map(|o| o.archive),
            });
            return;
        }

        match remove_dir_if_present(dir) {
            Ok(()) => {
                debug!(workspace = %dir.display(), "Removed garbage workspace");
                report.removed.push(dir.to_path_buf());
            }
            Err(e) => {
                warn!(workspace = %dir.display(), error = %e, "Failed to remove garbage workspace");
                report
                    .errors
                    .push(format!("failed to remove {}: {}", dir.display(), e));
            }
        }
    }
}
