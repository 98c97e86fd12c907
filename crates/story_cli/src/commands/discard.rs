//! Drop a project's leftover workspace.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use story_core::{Config, WorkspacePaths, WorkspaceStore};

pub fn run(config: &Config, archive: &Path) -> Result<()> {
    let store = WorkspaceStore::new(WorkspacePaths::from_config(&config.workspace));
    let workspace = store.paths().derive(archive)?;

    if !store.exists(&workspace) {
        println!("{} No workspace for {}.", style("✓").green(), archive.display());
        return Ok(());
    }

    store
        .discard(&workspace)
        .with_context(|| format!("Failed to discard {}", workspace.display()))?;
    println!("{} Discarded {}", style("✓").green(), workspace.display());
    Ok(())
}
