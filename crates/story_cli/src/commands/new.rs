//! Create a new project archive.

use super::with_spinner;
use anyhow::{bail, Context, Result};
use console::style;
use std::path::Path;
use story_core::{archive, Config, WorkspacePaths};
use tempfile::TempDir;

/// Creates `archive` holding nothing but an empty embedded store.
pub fn run(config: &Config, target: &Path) -> Result<()> {
    if target.exists() {
        bail!("{} already exists", target.display());
    }

    let paths = WorkspacePaths::from_config(&config.workspace);
    let staging = TempDir::new().context("Failed to create staging directory")?;
    let store = paths.store_path(staging.path());
    redb::Database::create(&store)
        .with_context(|| format!("Failed to create store at {}", store.display()))?;

    with_spinner("Writing project archive...", || {
        let temp = archive::pack_to_temp(
            staging.path(),
            target,
            &paths,
            config.archive.compression_level,
        )?;
        archive::replace(temp, target)
            .with_context(|| format!("Failed to write {}", target.display()))
    })?;

    println!(
        "{} Created project {}",
        style("✓").green(),
        style(target.display()).cyan()
    );
    Ok(())
}
