//! Adjudication of a crashed workspace found while loading its archive.
//!
//! A leftover workspace is only reused when its embedded store passes the
//! store's own integrity check and the user chooses to restore it. A store
//! that fails the check is never partially recovered.

use crate::dialog::Dialog;
use crate::error::{StoryError, Result};
use crate::lock;
use crate::paths::WorkspacePaths;
use crate::workspace::last_modified;
use chrono::{DateTime, Local};
use redb::Database;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{info, warn};

/// Title of the restore prompt.
pub const RECOVERY_TITLE: &str = "Recover unsaved work?";

/// Label of the option that reuses the leftover workspace.
pub const RESTORE_OPTION: &str = "Restore";

/// Label of the option that re-extracts from the archive.
pub const DISCARD_OPTION: &str = "Discard";

/// Decides whether an unlocked leftover workspace is resumed.
pub struct RecoveryArbiter<'a> {
    paths: &'a WorkspacePaths,
    dialog: &'a dyn Dialog,
}

impl<'a> RecoveryArbiter<'a> {
    pub fn new(paths: &'a WorkspacePaths, dialog: &'a dyn Dialog) -> Self {
        Self { paths, dialog }
    }

    /// Verifies the workspace's store and asks the user whether to resume it.
    ///
    /// Returns `Ok(true)` when the user restores (the lock marker, if any, is
    /// touched to claim it; the caller must still acquire a `SessionLock`),
    /// `Ok(false)` when the user discards.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the store is missing or fails its integrity check;
    /// the user is not asked in that case. Returns `Io` if the archive or
    /// workspace timestamps cannot be read.
    pub fn try_recover(&self, archive: &Path, workspace: &Path) -> Result<bool> {
        // Timestamps first: nothing below may be allowed to move them.
        let archive_time = fs::metadata(archive)?.modified()?;
        let workspace_time = last_modified(workspace)?;

        let store_path = self.paths.store_path(workspace);
        if let Err(e) = verify_store(&store_path) {
            warn!(workspace = %workspace.display(), error = %e, "Leftover workspace failed integrity check");
            return Err(e);
        }

        let message = format!(
            "Unsaved changes from a previous session were found.\n\n\
             Project file last saved: {}\n\
             Unsaved workspace last modified: {}\n\n\
             Restore the unsaved workspace, or discard it and reopen the project file?",
            format_time(archive_time),
            format_time(workspace_time),
        );

        if self
            .dialog
            .choice(RECOVERY_TITLE, &message, RESTORE_OPTION, DISCARD_OPTION)
        {
            if !lock::touch(&self.paths.lock_path(workspace)) {
                info!(workspace = %workspace.display(), "No lock marker to claim");
            }
            info!(workspace = %workspace.display(), "Restoring leftover workspace");
            Ok(true)
        } else {
            info!(workspace = %workspace.display(), "Leftover workspace discarded by user");
            Ok(false)
        }
    }
}

/// Runs the embedded store's consistency check on a scratch copy.
///
/// The store itself is never opened, so neither its bytes nor its
/// modification time change. Opening the copy replays the store's own
/// crash repair (rolling back to the last committed transaction), which is
/// what the record-store layer would do on its next open; a store that
/// still fails afterwards, or cannot be opened at all, is corrupt.
pub fn verify_store(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(corrupt(path, "store file missing".to_string()));
    }

    let scratch = tempfile::Builder::new()
        .prefix(".story-verify-")
        .tempdir()?;
    let copy = scratch.path().join("store");
    fs::copy(path, &copy).map_err(|e| corrupt(path, format!("cannot read: {}", e)))?;

    let mut db = Database::open(&copy).map_err(|e| corrupt(path, format!("cannot open: {}", e)))?;

    let checked = match db.check_integrity() {
        Ok(true) => Ok(()),
        Ok(false) => Err(corrupt(path, "integrity check required repairs".to_string())),
        Err(e) => Err(corrupt(path, format!("integrity check failed: {}", e))),
    };
    drop(db);
    checked
}

fn corrupt(path: &Path, reason: String) -> StoryError {
    StoryError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
