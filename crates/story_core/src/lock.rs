//! Cross-process session lock for a workspace directory.
//!
//! A session is live exactly while some process holds an exclusive OS lock
//! (`flock(2)` on Unix, `LockFileEx` on Windows, both via `fs2`) on the
//! workspace's lock marker. The marker file itself may outlive a crashed
//! process; such a stale marker is not held by anyone and does not count as
//! a live session.

use crate::error::{StoryError, Result};
use crate::paths::WorkspacePaths;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Exclusive ownership of one workspace.
///
/// Holds an open handle with an exclusive lock on the workspace's marker
/// file. Releasing (explicitly or on drop) deletes the marker and then
/// closes the handle, which releases the OS lock.
#[derive(Debug)]
pub struct SessionLock {
    /// The open marker file (holds the OS lock).
    /// Wrapped in Option so release can run more than once.
    file: Option<File>,
    /// Path to the marker file.
    path: PathBuf,
    /// Workspace the marker belongs to.
    workspace: PathBuf,
}

impl SessionLock {
    /// Acquires the session lock of `workspace`.
    ///
    /// Creates the marker if needed; a stale marker left by a dead process is
    /// taken over. Never waits.
    ///
    /// # Errors
    ///
    /// - `SessionInUse` if another handle (in any process) holds the lock
    /// - `Io` for every other failure (missing directory, permissions, disk full)
    pub fn acquire(paths: &WorkspacePaths, workspace: &Path) -> Result<Self> {
        let path = paths.lock_path(workspace);

        // No truncation here: the current holder's PID must survive a failed attempt.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(StoryError::SessionInUse {
                    workspace: workspace.to_path_buf(),
                    pid: read_pid(&path),
                });
            }
            return Err(StoryError::Io(e));
        }

        // A releasing holder unlinks the marker before unlocking; if we locked
        // that orphaned inode, the name now belongs to someone else.
        if !still_linked(&file, &path)? {
            return Err(StoryError::SessionInUse {
                workspace: workspace.to_path_buf(),
                pid: read_pid(&path),
            });
        }

        let mut lock = Self {
            file: Some(file),
            path,
            workspace: workspace.to_path_buf(),
        };
        lock.write_pid()?;

        debug!(path = %lock.path.display(), "Acquired session lock");
        Ok(lock)
    }

    /// Releases the lock and deletes the marker. Safe to call repeatedly.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };

        // Delete while still holding the lock so nobody can claim the old marker.
        let removed = fs::remove_file(&self.path);
        if let Err(e) = file.unlock() {
            debug!(path = %self.path.display(), error = %e, "Unlock failed, closing handle");
        }
        drop(file);

        if let Err(e) = removed {
            // Windows refuses to delete an open file; retry now that it's closed.
            if e.kind() != io::ErrorKind::NotFound {
                if let Err(e) = fs::remove_file(&self.path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(path = %self.path.display(), error = %e, "Failed to remove lock marker");
                    }
                }
            }
        }

        debug!(path = %self.path.display(), "Released session lock");
    }

    /// Returns true once the lock has been released.
    pub fn is_released(&self) -> bool {
        self.file.is_none()
    }

    /// Path of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Workspace this lock guards.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn write_pid(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sets the modification time of an existing file to now.
///
/// Does not need (or take) the lock. Returns false instead of failing when
/// the file is gone or inaccessible.
pub fn touch(path: &Path) -> bool {
    let result = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));

    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Touch failed");
            false
        }
    }
}

/// Returns true if the marker at `path` exists and a live process holds its lock.
///
/// Tries the lock on a fresh handle and releases it at once.
/// A marker that cannot even be opened is reported as held.
///
/// While this check holds the lock (between `try_lock_exclusive` and
/// `unlock`), an [`SessionLock::acquire`] in another process fails with
/// `SessionInUse` even though nobody owns the session. The window is a few
/// system calls wide and the caller sees an ordinary "in use" error it can
/// retry. A shared lock would not close it, since an exclusive
/// acquire conflicts with shared holders too.
pub fn is_held(path: &Path) -> bool {
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot open lock marker, treating as held");
            return true;
        }
    };

    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.unlock();
            false
        }
        Err(e) if is_contended(&e) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Lock check failed, treating as held");
            true
        }
    }
}

/// Reads the PID recorded in a marker, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn is_contended(err: &io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    match (err.raw_os_error(), contended.raw_os_error()) {
        (Some(a), Some(b)) => a == b,
        _ => err.kind() == contended.kind(),
    }
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(named) => Ok(named.dev() == held.dev() && named.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, _path: &Path) -> io::Result<bool> {
    Ok(true)
}
