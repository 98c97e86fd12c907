//! Open a project, let the user work in its workspace, save, close.

use super::with_spinner;
use crate::prompt::{self, TerminalDialog};
use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use story_core::{archive, Config, SessionController};
use tracing::warn;

/// Opens `archive` and runs `command` inside its workspace.
pub fn run(config: &Config, archive: &Path, command: &[String]) -> Result<()> {
    let controller = SessionController::new(config, Arc::new(TerminalDialog));
    run_session(controller, archive, command)
}

/// Loads `archive` with `controller`, runs the editing command, offers to
/// save when the workspace changed, and closes.
pub fn run_session(
    mut controller: SessionController,
    archive: &Path,
    command: &[String],
) -> Result<()> {
    controller
        .load(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;

    let workspace = controller
        .workspace()
        .context("Workspace missing after load")?
        .to_path_buf();
    println!(
        "{} Opened {} in {}",
        style("✓").green(),
        style(archive.display()).cyan(),
        workspace.display()
    );

    let before = archive::digest_directory(&workspace, controller.paths())?;
    run_in(&workspace, command)?;
    let after = match archive::digest_directory(&workspace, controller.paths()) {
        Ok(after) => after,
        Err(e) => {
            // The command ran, so the workspace may hold edits we cannot see.
            controller.mark_dirty();
            return Err(e).with_context(|| {
                format!(
                    "Failed to inspect {} after editing; workspace kept",
                    workspace.display()
                )
            });
        }
    };
    if before != after {
        controller.mark_dirty();
    }

    if controller.is_dirty() {
        if confirm_save(&controller)? {
            let target = controller
                .archive()
                .context("Archive missing after load")?
                .to_path_buf();
            with_spinner("Saving project...", || {
                controller
                    .save(&target)
                    .with_context(|| format!("Failed to save {}", target.display()))
            })?;
            println!("{} Saved {}", style("✓").green(), style(target.display()).cyan());
        } else if changes_recoverable(&controller) {
            println!(
                "{} Unsaved changes kept in {}; run {} to resume them.",
                style("ℹ").blue(),
                workspace.display(),
                style("story recover").cyan()
            );
        } else {
            println!(
                "{} Unsaved changes left in {} will be removed by the next scan.",
                style("⚠").yellow(),
                workspace.display()
            );
        }
    } else {
        println!("{} No changes.", style("✓").green());
    }

    controller.close();
    Ok(())
}

/// Asks whether to save. A "no" is asked once more when the changes could
/// not be recovered later.
fn confirm_save(controller: &SessionController) -> Result<bool> {
    if prompt::confirm("Save changes?", true)? {
        return Ok(true);
    }
    if changes_recoverable(controller) {
        return Ok(false);
    }
    println!(
        "{} This project has no {} store, so a crash scan will delete unsaved changes.",
        style("⚠").yellow(),
        controller
            .store_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default()
    );
    Ok(prompt::confirm("Save changes anyway?", true)?)
}

/// True when a crash scan would offer the open workspace for recovery
/// after a dirty close.
fn changes_recoverable(controller: &SessionController) -> bool {
    controller.store_path().is_some_and(|store| store.is_file())
}

fn run_in(workspace: &Path, command: &[String]) -> Result<()> {
    let (program, args) = match command.split_first() {
        Some((program, args)) => (program.clone(), args),
        None => (default_shell(), &[][..]),
    };

    let status = Command::new(&program)
        .args(args)
        .current_dir(workspace)
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if !status.success() {
        warn!(program = %program, status = %status, "Command exited unsuccessfully");
    }
    Ok(())
}

fn default_shell() -> String {
    #[cfg(windows)]
    let fallback = "cmd";
    #[cfg(not(windows))]
    let fallback = "sh";
    std::env::var("SHELL").unwrap_or_else(|_| fallback.to_string())
}
