//! Startup recovery: offer the most recent crashed session.

use super::edit;
use crate::prompt;
use anyhow::Result;
use chrono::{DateTime, Local};
use console::style;
use std::sync::Arc;
use story_core::{Config, CrashScanner, FixedChoice, SessionController, WorkspacePaths, WorkspaceStore};

/// Scans for crashes and either resumes or discards the most recent one.
pub fn run(config: &Config, command: &[String]) -> Result<()> {
    let paths = WorkspacePaths::from_config(&config.workspace);
    let report = CrashScanner::new(paths.clone()).scan()?;

    let Some(session) = report.most_recent() else {
        println!("{} No crashed sessions found.", style("✓").green());
        return Ok(());
    };

    let when: DateTime<Local> = session.last_modified.into();
    let question = format!(
        "Found a crash from {}. Do you want to recover?",
        when.format("%Y-%m-%d %H:%M:%S")
    );

    if !prompt::confirm(&question, true)? {
        WorkspaceStore::new(paths).discard(&session.path)?;
        println!(
            "{} Discarded {}",
            style("✓").green(),
            session.path.display()
        );
        return Ok(());
    }

    let Some(archive) = session.origin.clone() else {
        println!(
            "{} {} does not record its project file. It was left in place.",
            style("⚠").yellow().bold(),
            session.path.display()
        );
        return Ok(());
    };

    // The user already chose to restore; don't ask twice.
    let controller = SessionController::new(config, Arc::new(FixedChoice(true)));
    edit::run_session(controller, &archive, command)
}
