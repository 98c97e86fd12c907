//! Story Core Library
//!
//! Project session management for a desktop writing application, providing:
//! - Extraction of a project archive into a private working directory
//! - Cross-process exclusive sessions over that directory
//! - Atomic save back to the archive
//! - Detection and recovery of sessions that ended in a crash
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use story_core::{Config, FixedChoice, SessionController};
//!
//! let config = Config::default();
//! let mut controller = SessionController::new(&config, Arc::new(FixedChoice(true)));
//!
//! controller.load(Path::new("novel.story")).unwrap();
//! // ... edit files under controller.workspace() ...
//! controller.mark_dirty();
//! controller.save(Path::new("novel.story")).unwrap();
//! controller.close();
//! ```
//!
//! # Crash Recovery
//!
//! Sessions that did not close cleanly leave their workspace behind. A scan
//! at startup lists them; loading the archive again offers to restore the
//! leftover work.
//!
//! ```
//! use story_core::{CrashScanner, WorkspacePaths};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let scanner = CrashScanner::new(WorkspacePaths::new(tmp.path().join("StoryMode")));
//!
//! let report = scanner.scan().unwrap();
//! assert!(report.most_recent().is_none());
//! ```

pub mod archive;
mod config;
mod controller;
mod dialog;
mod error;
pub mod lock;
mod paths;
mod recovery;
mod scanner;
mod workspace;

pub use config::{ArchiveConfig, Config, WorkspaceConfig, DEFAULT_ROOT_DIR};
pub use controller::{SessionController, SessionState, StoreHandoff, CORRUPT_ALERT_TITLE};
pub use dialog::{Dialog, FixedChoice};
pub use error::{Result, StoryError};
pub use lock::SessionLock;
pub use paths::WorkspacePaths;
pub use recovery::{verify_store, RecoveryArbiter, DISCARD_OPTION, RECOVERY_TITLE, RESTORE_OPTION};
pub use scanner::{CrashScanner, RecoverySession, ScanReport};
pub use workspace::{last_modified, SessionOrigin, WorkspaceStore};
