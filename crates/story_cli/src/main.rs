//! Story CLI - Command-line shell for Story project sessions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use story_core::StoryError;

mod commands;
mod prompt;

#[derive(Parser)]
#[command(name = "story")]
#[command(about = "Open, edit and recover Story project archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root directory (overrides the configuration)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty project archive
    New {
        /// Path of the archive to create
        archive: PathBuf,
    },
    /// Open a project, run a command inside its workspace, then save
    Edit {
        /// Project archive
        archive: PathBuf,
        /// Command to run in the workspace (default: $SHELL)
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// List workspaces left behind by crashed sessions
    Scan,
    /// Offer to resume the most recent crashed session
    Recover {
        /// Command to run in the restored workspace (default: $SHELL)
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Delete a project's leftover workspace
    Discard {
        /// Project archive whose workspace should be dropped
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.root.as_deref())?;

    let result = match cli.command {
        Commands::New { archive } => commands::new::run(&config, &archive),
        Commands::Edit { archive, command } => commands::edit::run(&config, &archive, &command),
        Commands::Scan => commands::scan::run(&config),
        Commands::Recover { command } => commands::recover::run(&config, &command),
        Commands::Discard { archive } => commands::discard::run(&config, &archive),
    };

    if let Err(e) = &result {
        if let Some(hint) = e
            .downcast_ref::<StoryError>()
            .and_then(StoryError::recovery_suggestion)
        {
            eprintln!("{} {}", style("Hint:").cyan(), hint);
        }
    }

    result
}
