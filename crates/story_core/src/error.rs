//! Error types for story_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for project session operations.
#[derive(Error, Debug)]
pub enum StoryError {
    /// The project archive does not exist.
    #[error("project archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    /// The archive path has no file name to derive a workspace from.
    #[error("invalid project archive path: {}", .0.display())]
    InvalidArchivePath(PathBuf),

    /// The workspace is locked by another live process.
    #[error("session already open in another process: {}{}", workspace.display(), pid.map(|p| format!(" (PID: {})", p)).unwrap_or_default())]
    SessionInUse {
        /// Workspace directory whose lock is held
        workspace: PathBuf,
        /// PID recorded in the lock marker, if readable
        pid: Option<u32>,
    },

    /// The embedded store failed its integrity check.
    #[error("corrupted store at {}: {}", path.display(), reason)]
    Corrupt {
        /// Path to the store file
        path: PathBuf,
        /// Description of the failure
        reason: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be read or written.
    #[error("archive error: {0}")]
    Archive(String),

    /// Operation invoked from a state that does not allow it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Operation attempted
        operation: &'static str,
        /// State the controller was in
        state: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoryError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ArchiveNotFound(_) => Some("Check the path, or create a project with 'story new <archive>'."),
            Self::SessionInUse { .. } => {
                Some("The project is open in another window. Close it there first.")
            }
            Self::Corrupt { .. } => Some(
                "The unsaved workspace could not be verified. The project was reopened from the last save.",
            ),
            Self::Archive(_) => Some("The project file may be damaged. Try a backup copy."),
            Self::Config(_) => Some("Fix or delete the configuration file to fall back to defaults."),
            _ => None,
        }
    }

    /// Returns false for errors that indicate a caller bug rather than a user-facing condition.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::InvalidState { .. })
    }
}

impl From<zip::result::ZipError> for StoryError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Archive(other.to_string()),
        }
    }
}

/// Convenience Result type for story_core operations.
pub type Result<T> = std::result::Result<T, StoryError>;
