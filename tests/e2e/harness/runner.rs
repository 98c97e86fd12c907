use super::assertions::{Assertion, ErrorMatch};
use super::dialog::ScriptedDialog;
use super::steps::ScenarioStep;
use super::workspace::{read_file, ArchiveFixture, TestEnv};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use story_core::{
    archive, lock, CrashScanner, FixedChoice, ScanReport, SessionController, StoryError,
};
use tempfile::TempDir;

/// PID written into markers left by simulated crashes. No such process exists.
const DEAD_PID: &[u8] = b"999999\n";

/// Executes scenarios against real controllers on a real filesystem
pub struct ScenarioRunner {
    env: TestEnv,
    dialog: Arc<ScriptedDialog>,
    controller: Option<SessionController>,
    rivals: Vec<SessionController>,
    last_scan: Option<ScanReport>,
    remembered: HashMap<String, Vec<u8>>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a runner with the given archives already written
    pub fn new(archives: &[ArchiveFixture]) -> Result<Self> {
        let env = TestEnv::new()?;
        for fixture in archives {
            if fixture.with_store {
                env.create_archive(&fixture.name, &fixture.files)?;
            } else {
                env.create_storeless_archive(&fixture.name, &fixture.files)?;
            }
        }

        let dialog = Arc::new(ScriptedDialog::new());
        let controller = SessionController::new(env.config(), dialog.clone());

        Ok(Self {
            env,
            dialog,
            controller: Some(controller),
            rivals: Vec::new(),
            last_scan: None,
            remembered: HashMap::new(),
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Load { name } => self.handle_load(name),
            ScenarioStep::LoadFails { name, expected } => self.handle_load_fails(name, *expected),
            ScenarioStep::Save => self.handle_save(None),
            ScenarioStep::SaveAs { name } => self.handle_save(Some(name)),
            ScenarioStep::SaveFails { expected } => self.handle_save_fails(*expected),
            ScenarioStep::Close => self.handle_close(),

            ScenarioStep::WriteFile { path, content } => self.handle_write(path, content),
            ScenarioStep::RemoveFile { path } => self.handle_remove(path),

            ScenarioStep::AnswerRecovery { restore } => {
                self.dialog.push_answer(*restore);
                Ok(())
            }

            ScenarioStep::OpenElsewhere { name } => self.handle_open_elsewhere(name),
            ScenarioStep::CloseElsewhere => self.handle_close_elsewhere(),

            ScenarioStep::Scan => self.handle_scan(),
            ScenarioStep::LeaveGarbage { name } => self.env.leave_garbage(name).map(|_| ()),

            ScenarioStep::Crash => self.handle_crash(),
            ScenarioStep::Restart => self.handle_restart(),
            ScenarioStep::CorruptStore { name } => self.handle_corrupt_store(name),
            ScenarioStep::BreakWorkspace => self.handle_break_workspace(),

            ScenarioStep::RememberArchive { name } => {
                let bytes = fs::read(self.env.archive_path(name))?;
                self.remembered.insert(name.clone(), bytes);
                Ok(())
            }

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn controller(&mut self) -> Result<&mut SessionController> {
        self.controller
            .as_mut()
            .ok_or_else(|| anyhow!("Controller not available (crashed?)"))
    }

    fn open_workspace(&self) -> Result<PathBuf> {
        self.controller
            .as_ref()
            .and_then(|c| c.workspace())
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("No project open"))
    }

    // ===== Life cycle handlers =====

    fn handle_load(&mut self, name: &str) -> Result<()> {
        let archive = self.env.archive_path(name);
        self.controller()?.load(&archive)?;
        Ok(())
    }

    fn handle_load_fails(&mut self, name: &str, expected: ErrorMatch) -> Result<()> {
        let archive = self.env.archive_path(name);
        match self.controller()?.load(&archive) {
            Ok(()) => bail!("Load of {} succeeded, expected {:?}", name, expected),
            Err(e) => check_error(&e, expected),
        }
    }

    fn handle_save(&mut self, name: Option<&String>) -> Result<()> {
        let target = match name {
            Some(name) => self.env.archive_path(name),
            None => self
                .controller()?
                .archive()
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("No project open"))?,
        };
        self.controller()?.save(&target)?;
        Ok(())
    }

    fn handle_save_fails(&mut self, expected: ErrorMatch) -> Result<()> {
        let controller = self.controller()?;
        let target = controller
            .archive()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("nothing-open.story"));
        match controller.save(&target) {
            Ok(()) => bail!("Save succeeded, expected {:?}", expected),
            Err(e) => check_error(&e, expected),
        }
    }

    fn handle_close(&mut self) -> Result<()> {
        self.controller()?.close();
        Ok(())
    }

    // ===== Editing handlers =====

    fn handle_write(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.open_workspace()?.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content).with_context(|| format!("Failed to write {}", path))?;
        self.controller()?.mark_dirty();
        Ok(())
    }

    fn handle_remove(&mut self, path: &str) -> Result<()> {
        let full_path = self.open_workspace()?.join(path);
        fs::remove_file(&full_path).with_context(|| format!("Failed to remove {}", path))?;
        self.controller()?.mark_dirty();
        Ok(())
    }

    // ===== Other process handlers =====

    fn handle_open_elsewhere(&mut self, name: &str) -> Result<()> {
        let mut rival = SessionController::new(self.env.config(), Arc::new(FixedChoice(false)));
        rival.load(&self.env.archive_path(name))?;
        self.rivals.push(rival);
        Ok(())
    }

    fn handle_close_elsewhere(&mut self) -> Result<()> {
        let mut rival = self
            .rivals
            .pop()
            .ok_or_else(|| anyhow!("No project open elsewhere"))?;
        rival.close();
        Ok(())
    }

    // ===== Scan handlers =====

    fn handle_scan(&mut self) -> Result<()> {
        let report = CrashScanner::new(self.env.paths()).scan()?;
        self.last_scan = Some(report);
        Ok(())
    }

    fn scan(&self) -> Result<&ScanReport> {
        self.last_scan
            .as_ref()
            .ok_or_else(|| anyhow!("No scan has run"))
    }

    // ===== Failure handlers =====

    /// Leaves the disk the way a killed process would: the workspace with
    /// its unsaved edits, a marker nobody holds, and the origin record.
    fn handle_crash(&mut self) -> Result<()> {
        let Some(mut controller) = self.controller.take() else {
            return Ok(());
        };

        let marker = controller
            .workspace()
            .map(|ws| controller.paths().lock_path(ws));

        // Dirty keeps the workspace on close.
        controller.mark_dirty();
        controller.close();
        drop(controller);

        if let Some(marker) = marker {
            fs::write(&marker, DEAD_PID)?;
        }
        Ok(())
    }

    fn handle_restart(&mut self) -> Result<()> {
        if self.controller.is_some() {
            bail!("Restart without a crash");
        }
        self.controller = Some(SessionController::new(
            self.env.config(),
            self.dialog.clone(),
        ));
        Ok(())
    }

    fn handle_corrupt_store(&mut self, name: &str) -> Result<()> {
        let workspace = self.env.workspace_path(name);
        let store = self.env.paths().store_path(&workspace);
        fs::write(&store, vec![0xA5u8; 512])?;
        Ok(())
    }

    #[cfg(unix)]
    fn handle_break_workspace(&mut self) -> Result<()> {
        let workspace = self.open_workspace()?;
        std::os::unix::fs::symlink(
            workspace.join("does-not-exist"),
            workspace.join("broken-link.md"),
        )?;
        self.controller()?.mark_dirty();
        Ok(())
    }

    #[cfg(not(unix))]
    fn handle_break_workspace(&mut self) -> Result<()> {
        bail!("Breaking a workspace needs symlinks")
    }

    // ===== Assertion handler =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::State(expected) => {
                let state = self
                    .controller
                    .as_ref()
                    .map(|c| c.state())
                    .ok_or_else(|| anyhow!("Controller not available"))?;
                if state != *expected {
                    bail!("Expected state {:?}, got {:?}", expected, state);
                }
            }
            Assertion::Dirty(expected) => {
                let dirty = self.controller.as_ref().map(|c| c.is_dirty()).unwrap_or(false);
                if dirty != *expected {
                    bail!("Expected dirty={}, got {}", expected, dirty);
                }
            }
            Assertion::WorkspaceExists(name) => {
                let ws = self.env.workspace_path(name);
                if !ws.is_dir() {
                    bail!("Workspace {} does not exist", ws.display());
                }
            }
            Assertion::NoWorkspace(name) => {
                let ws = self.env.workspace_path(name);
                if ws.exists() {
                    bail!("Workspace {} still exists", ws.display());
                }
            }
            Assertion::LockMarker { name, present } => {
                let marker = self.env.paths().lock_path(&self.env.workspace_path(name));
                if marker.exists() != *present {
                    bail!(
                        "Expected lock marker present={}, got {}",
                        present,
                        marker.exists()
                    );
                }
            }
            Assertion::LockHeld { name, held } => {
                let marker = self.env.paths().lock_path(&self.env.workspace_path(name));
                let actual = lock::is_held(&marker);
                if actual != *held {
                    bail!("Expected lock held={}, got {}", held, actual);
                }
            }
            Assertion::WorkspaceFile { path, content } => {
                let actual = read_file(&self.open_workspace()?, path)?;
                if actual != content.as_bytes() {
                    bail!(
                        "File {} contains {:?}, expected {:?}",
                        path,
                        String::from_utf8_lossy(&actual),
                        content
                    );
                }
            }
            Assertion::WorkspaceFileAbsent { path } => {
                if self.open_workspace()?.join(path).exists() {
                    bail!("File {} should not exist", path);
                }
            }
            Assertion::WorkspaceMatchesArchive => self.check_workspace_matches_archive()?,
            Assertion::ArchiveFile {
                name,
                path,
                content,
            } => match self.env.read_archive_entry(name, path)? {
                Some(actual) if actual == content.as_bytes() => {}
                Some(actual) => bail!(
                    "Archive {} entry {} contains {:?}, expected {:?}",
                    name,
                    path,
                    String::from_utf8_lossy(&actual),
                    content
                ),
                None => bail!("Archive {} has no entry {}", name, path),
            },
            Assertion::ArchiveFileAbsent { name, path } => {
                if self.env.read_archive_entry(name, path)?.is_some() {
                    bail!("Archive {} should not contain {}", name, path);
                }
            }
            Assertion::ArchiveUnchanged(name) => {
                let before = self
                    .remembered
                    .get(name)
                    .ok_or_else(|| anyhow!("Archive {} was never remembered", name))?;
                let now = fs::read(self.env.archive_path(name))?;
                if &now != before {
                    bail!("Archive {} changed", name);
                }
            }
            Assertion::NoTempFiles => {
                let leftovers = self.env.temp_files()?;
                if !leftovers.is_empty() {
                    bail!("Temporary archives left behind: {:?}", leftovers);
                }
            }
            Assertion::PromptCount(expected) => {
                let count = self.dialog.prompt_count();
                if count != *expected {
                    bail!(
                        "Expected {} prompts, got {} (last: {:?})",
                        expected,
                        count,
                        self.dialog.last_prompt()
                    );
                }
            }
            Assertion::AlertCount(expected) => {
                let count = self.dialog.alert_count();
                if count != *expected {
                    bail!("Expected {} alerts, got {}", expected, count);
                }
            }
            Assertion::ScanFound(expected) => {
                let found = self.scan()?.sessions.len();
                if found != *expected {
                    bail!("Expected {} recoverable sessions, got {}", expected, found);
                }
            }
            Assertion::ScanMostRecent(name) => {
                let expected = self.env.workspace_path(name);
                let actual = self
                    .scan()?
                    .most_recent()
                    .map(|s| s.path.clone())
                    .ok_or_else(|| anyhow!("Scan found nothing"))?;
                if actual != expected {
                    bail!("Most recent crash is {}, expected {}", actual.display(), expected.display());
                }
            }
            Assertion::ScanOrigin { name } => {
                let expected = fs::canonicalize(self.env.archive_path(name))?;
                let origin = self
                    .scan()?
                    .most_recent()
                    .and_then(|s| s.origin.clone())
                    .ok_or_else(|| anyhow!("Most recent crash has no origin"))?;
                if origin != expected {
                    bail!("Origin is {}, expected {}", origin.display(), expected.display());
                }
            }
            Assertion::ScanRemoved(expected) => {
                let removed = self.scan()?.removed.len();
                if removed != *expected {
                    bail!("Expected {} removed workspaces, got {}", expected, removed);
                }
            }
            Assertion::ScanLive(expected) => {
                let live = self.scan()?.live.len();
                if live != *expected {
                    bail!("Expected {} live sessions, got {}", expected, live);
                }
            }
            Assertion::Custom(check) => check(&self.env)?,
        }
        Ok(())
    }

    fn check_workspace_matches_archive(&self) -> Result<()> {
        let controller = self
            .controller
            .as_ref()
            .ok_or_else(|| anyhow!("Controller not available"))?;
        let (Some(archive_path), Some(workspace)) = (controller.archive(), controller.workspace())
        else {
            bail!("No project open");
        };

        let fresh = TempDir::new()?;
        archive::extract(archive_path, fresh.path())?;

        let paths = self.env.paths();
        let expected = archive::digest_directory(fresh.path(), &paths)?;
        let actual = archive::digest_directory(workspace, &paths)?;
        if expected != actual {
            bail!("Workspace differs from a fresh extraction of its archive");
        }
        Ok(())
    }
}

fn check_error(err: &StoryError, expected: ErrorMatch) -> Result<()> {
    if expected.matches(err) {
        Ok(())
    } else {
        bail!("Expected {:?}, got error: {}", expected, err)
    }
}
