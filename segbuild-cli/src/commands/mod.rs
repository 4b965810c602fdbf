//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod backoff;
mod build;

pub use backoff::BackoffCommands;
pub use build::BuildCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Segment build management
    Build {
        #[command(subcommand)]
        command: BuildCommands,
    },
    /// Webhook retry backoff policies
    Backoff {
        #[command(subcommand)]
        command: BackoffCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Build { command } => build::handle_build_command(command, config).await,
        Commands::Backoff { command } => backoff::handle_backoff_command(command),
    }
}
