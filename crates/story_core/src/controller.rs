//! Project session life cycle: load, save, close.
//!
//! `SessionController` ties the other pieces together:
//!
//! ```text
//! load:  derive workspace -> locked? -> recover or extract -> lock -> Ready
//! save:  pack workspace to temp -> rename over archive -> touch lock
//! close: release lock -> drop clean workspace -> Idle
//! ```
//!
//! The controller is an ordinary owned value. Construct one and pass it to
//! whatever needs it.

use crate::archive;
use crate::config::Config;
use crate::dialog::Dialog;
use crate::error::{StoryError, Result};
use crate::lock::{self, SessionLock};
use crate::paths::WorkspacePaths;
use crate::recovery::RecoveryArbiter;
use crate::workspace::{remove_dir_if_present, WorkspaceStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Title of the alert shown when a leftover workspace fails verification.
pub const CORRUPT_ALERT_TITLE: &str = "Recovery failed";

/// Receives the embedded store's location once a workspace is ready.
///
/// The record-store layer opens its own connection from this path.
pub trait StoreHandoff: Send + Sync {
    fn on_workspace_ready(&self, store_path: &Path);
}

impl<F> StoreHandoff for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn on_workspace_ready(&self, store_path: &Path) {
        self(store_path)
    }
}

/// Life-cycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No project open.
    Idle,
    /// A load is in progress.
    Loading,
    /// Workspace live and locked.
    Ready,
    /// A save is in progress.
    Saving,
    /// A close is in progress.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Saving => "saving",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// The open project: archive, workspace and the lock that owns it.
#[derive(Debug)]
struct ActiveSession {
    archive: PathBuf,
    workspace: PathBuf,
    lock: SessionLock,
}

/// Owns at most one open project at a time.
pub struct SessionController {
    store: WorkspaceStore,
    compression_level: i64,
    dialog: Arc<dyn Dialog>,
    handoff: Option<Arc<dyn StoreHandoff>>,
    state: SessionState,
    active: Option<ActiveSession>,
    dirty: bool,
}

impl SessionController {
    /// Creates an idle controller.
    pub fn new(config: &Config, dialog: Arc<dyn Dialog>) -> Self {
        Self {
            store: WorkspaceStore::new(WorkspacePaths::from_config(&config.workspace)),
            compression_level: config.archive.compression_level,
            dialog,
            handoff: None,
            state: SessionState::Idle,
            active: None,
            dirty: false,
        }
    }

    /// Registers the collaborator that receives the store path on every load.
    pub fn with_store_handoff(mut self, handoff: impl StoreHandoff + 'static) -> Self {
        self.handoff = Some(Arc::new(handoff));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when the workspace may hold changes not yet saved to the archive.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Archive of the open project.
    pub fn archive(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.archive.as_path())
    }

    /// Workspace of the open project.
    pub fn workspace(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.workspace.as_path())
    }

    /// Embedded store file of the open project.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.workspace().map(|ws| self.store.paths().store_path(ws))
    }

    pub fn paths(&self) -> &WorkspacePaths {
        self.store.paths()
    }

    /// Records that the workspace changed. Ignored unless a project is open.
    pub fn mark_dirty(&mut self) {
        if self.state == SessionState::Ready {
            self.dirty = true;
        }
    }

    /// Opens a project archive.
    ///
    /// Reuses a leftover workspace if the user restores it, otherwise
    /// extracts the archive fresh. A restored workspace starts out dirty.
    /// On any error the controller is back in `Idle` with nothing acquired.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if a project is already open
    /// - `ArchiveNotFound` if the archive does not exist
    /// - `SessionInUse` if another process has the project open
    /// - `Io` / `Archive` for filesystem or extraction failures
    pub fn load(&mut self, archive: &Path) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid_state("load"));
        }
        if !archive.is_file() {
            warn!(archive = %archive.display(), "Load aborted: archive not found");
            return Err(StoryError::ArchiveNotFound(archive.to_path_buf()));
        }

        info!(archive = %archive.display(), "Loading project");
        self.state = SessionState::Loading;

        match self.load_inner(archive) {
            Ok((session, recovered)) => {
                info!(workspace = %session.workspace.display(), recovered, "Project loaded");
                if let Some(handoff) = &self.handoff {
                    handoff.on_workspace_ready(&self.store.paths().store_path(&session.workspace));
                }
                self.active = Some(session);
                // Restored work is not in the archive yet.
                self.dirty = recovered;
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(archive = %archive.display(), error = %e, "Project load failed");
                self.reset();
                Err(e)
            }
        }
    }

    fn load_inner(&self, archive: &Path) -> Result<(ActiveSession, bool)> {
        let archive = archive.canonicalize()?;
        let workspace = self.store.paths().derive(&archive)?;
        let mut recovered = false;

        if self.store.exists(&workspace) {
            if self.store.is_locked(&workspace) {
                warn!(workspace = %workspace.display(), "Workspace locked by another process");
                return Err(StoryError::SessionInUse {
                    pid: lock::read_pid(&self.store.paths().lock_path(&workspace)),
                    workspace,
                });
            }

            let arbiter = RecoveryArbiter::new(self.store.paths(), self.dialog.as_ref());
            recovered = match arbiter.try_recover(&archive, &workspace) {
                Ok(restored) => restored,
                Err(StoryError::Corrupt { path, reason }) => {
                    self.dialog.alert(
                        CORRUPT_ALERT_TITLE,
                        &format!(
                            "The unsaved workspace could not be verified ({}: {}). \
                             The project will be reopened from its last save.",
                            path.display(),
                            reason
                        ),
                    );
                    false
                }
                Err(e) => return Err(e),
            };
        }

        if !recovered {
            self.store.initialize_fresh(&archive, &workspace)?;
        }

        let claimed = SessionLock::acquire(self.store.paths(), &workspace).and_then(|lock| {
            self.store.write_origin(&workspace, &archive)?;
            Ok(lock)
        });

        match claimed {
            Ok(lock) => Ok((
                ActiveSession {
                    archive,
                    workspace,
                    lock,
                },
                recovered,
            )),
            Err(e) => {
                // A fresh extraction holds nothing the archive doesn't.
                if !recovered && !matches!(e, StoryError::SessionInUse { .. }) {
                    if let Err(cleanup) = remove_dir_if_present(&workspace) {
                        warn!(workspace = %workspace.display(), error = %cleanup, "Failed to remove workspace after failed load");
                    }
                }
                Err(e)
            }
        }
    }

    /// Writes the workspace back to `target` atomically.
    ///
    /// The archive is built in a temporary file and renamed over `target`;
    /// on failure `target` is left as it was and the temporary file is gone.
    /// The dirty flag is cleared only after the replace succeeded.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless a project is open
    /// - `Io` / `Archive` if building or replacing the archive fails
    pub fn save(&mut self, target: &Path) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(self.invalid_state("save"));
        }
        let Some(session) = self.active.as_ref() else {
            return Err(self.invalid_state("save"));
        };

        info!(target = %target.display(), "Saving project");
        self.state = SessionState::Saving;

        let result = archive::pack_to_temp(
            &session.workspace,
            target,
            self.store.paths(),
            self.compression_level,
        )
        .and_then(|temp| archive::replace(temp, target));

        self.state = SessionState::Ready;
        match result {
            Ok(()) => {
                if !lock::touch(session.lock.path()) {
                    warn!(path = %session.lock.path().display(), "Could not refresh lock marker after save");
                }
                self.dirty = false;
                info!(target = %target.display(), "Project saved");
                Ok(())
            }
            Err(e) => {
                error!(target = %target.display(), error = %e, "Save failed, archive left unchanged");
                Err(e)
            }
        }
    }

    /// Closes the open project. Never fails; does nothing when idle.
    ///
    /// A clean workspace is deleted (the archive holds everything). A dirty
    /// one is kept so the next load offers to restore it.
    pub fn close(&mut self) {
        let Some(mut session) = self.active.take() else {
            self.reset();
            return;
        };

        info!(archive = %session.archive.display(), "Closing project");
        self.state = SessionState::Closing;
        session.lock.release();

        if self.dirty {
            warn!(
                workspace = %session.workspace.display(),
                "Closing with unsaved changes, keeping workspace for recovery"
            );
        } else if let Err(e) = remove_dir_if_present(&session.workspace) {
            warn!(workspace = %session.workspace.display(), error = %e, "Failed to remove workspace");
        }

        self.reset();
    }

    fn reset(&mut self) {
        // Dropping the session releases its lock.
        self.active = None;
        self.dirty = false;
        self.state = SessionState::Idle;
    }

    fn invalid_state(&self, operation: &'static str) -> StoryError {
        StoryError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("dirty", &self.dirty)
            .finish()
    }
}
