//! Crash scan command.

use anyhow::Result;
use chrono::{DateTime, Local};
use console::style;
use story_core::{Config, CrashScanner, WorkspacePaths};

/// Scans the workspace root and prints what was found.
pub fn run(config: &Config) -> Result<()> {
    let paths = WorkspacePaths::from_config(&config.workspace);
    println!(
        "{} Scanning {}...",
        style("→").cyan(),
        paths.root().display()
    );

    let report = CrashScanner::new(paths).scan()?;

    println!();
    println!("{}", style("Crash Scan Report:").bold());
    println!("  Recoverable:   {}", style(report.sessions.len()).cyan());
    println!("  Live sessions: {}", style(report.live.len()).green());
    println!("  Cleaned up:    {}", style(report.removed.len()).yellow());

    if !report.sessions.is_empty() {
        println!();
        println!("{}", style("Recoverable sessions (most recent first):").bold());
        for session in &report.sessions {
            let modified: DateTime<Local> = session.last_modified.into();
            let origin = session
                .origin
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown project".to_string());
            println!(
                "  {} {}  {}  ({})",
                style("•").cyan(),
                modified.format("%Y-%m-%d %H:%M:%S"),
                session.path.display(),
                origin
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", style("Errors encountered:").red().bold());
        for error in &report.errors {
            println!("  {} {}", style("×").red(), error);
        }
    }

    Ok(())
}
