//! CLI commands.

pub mod discard;
pub mod edit;
pub mod new;
pub mod recover;
pub mod scan;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use story_core::Config;

/// Loads the configuration and applies command-line overrides.
pub fn load_config(path: Option<&Path>, root: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(root) = root {
        config.workspace.root = Some(root.to_path_buf());
    }
    Ok(config)
}

/// Runs `work` behind a spinner that is cleared however `work` returns.
pub fn with_spinner<T>(message: &str, work: impl FnOnce() -> Result<T>) -> Result<T> {
    finish_after(spinner(message), work)
}

fn finish_after<T>(pb: ProgressBar, work: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = work();
    pb.finish_and_clear();
    result
}

/// Spinner shown while a long filesystem operation runs.
fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
