//! Build command handlers
//!
//! Handles starting segment builds, one-shot status reads, and
//! following a build to completion.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use segbuild_client::BackendClient;
use segbuild_core::domain::build::{BuildState, BuildStatus, EntityId};
use segbuild_tracker::{BuildMonitor, BuildOutcome, RunDispatcher, RunOutcome};

use crate::config::Config;

/// Build subcommands
#[derive(Subcommand)]
pub enum BuildCommands {
    /// Start a build for a segment
    Run {
        /// Segment id
        entity_id: String,

        /// Persist the materialized audience
        #[arg(long)]
        materialize: bool,

        /// Follow the build until it completes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show the current build status of a segment
    Status {
        /// Segment id
        entity_id: String,
    },
    /// Follow a running build until it completes
    Watch {
        /// Segment id
        entity_id: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 2500)]
        interval_ms: u64,
    },
}

/// Handle build commands
pub async fn handle_build_command(command: BuildCommands, config: &Config) -> Result<()> {
    let client = Arc::new(BackendClient::new(&config.backend_url));

    match command {
        BuildCommands::Run {
            entity_id,
            materialize,
            watch,
        } => run_build(client, &EntityId::from(entity_id), materialize, watch).await,
        BuildCommands::Status { entity_id } => {
            show_status(&client, &EntityId::from(entity_id)).await
        }
        BuildCommands::Watch {
            entity_id,
            interval_ms,
        } => {
            let monitor = BuildMonitor::new(client);
            watch_build(
                &monitor,
                &EntityId::from(entity_id),
                Duration::from_millis(interval_ms),
            )
            .await
        }
    }
}

/// Start a build and report the outcome
async fn run_build(
    client: Arc<BackendClient>,
    entity_id: &EntityId,
    materialize: bool,
    watch: bool,
) -> Result<()> {
    let monitor = BuildMonitor::new(client.clone());
    let dispatcher = RunDispatcher::new(client, monitor.clone());

    match dispatcher.start(entity_id, materialize).await {
        RunOutcome::Enqueued { entry_id } => {
            println!(
                "{} Build enqueued for segment {}",
                "✓".green(),
                entity_id.to_string().cyan()
            );
            if let Some(entry) = entry_id {
                println!("  Entry: {}", entry.dimmed());
            }
            if watch {
                // The dispatcher already started tracking; just follow.
                follow_to_completion(&monitor, entity_id).await;
            }
        }
        RunOutcome::CompletedSync { result } => {
            println!(
                "{} Build completed synchronously for segment {}",
                "✓".green(),
                entity_id.to_string().cyan()
            );
            if let Some(result) = result {
                println!("  Result: {}", result.to_string().dimmed());
            }
        }
        RunOutcome::Failed { reason } => {
            println!("{} Build could not be started: {}", "✗".red(), reason);
            anyhow::bail!("run request failed");
        }
    }

    Ok(())
}

/// One-shot status read
async fn show_status(client: &BackendClient, entity_id: &EntityId) -> Result<()> {
    let status = client.fetch_status(entity_id).await?;
    print_status(&status);
    Ok(())
}

/// Track a build until it reaches a terminal state
async fn watch_build(monitor: &BuildMonitor, entity_id: &EntityId, interval: Duration) -> Result<()> {
    monitor.track_with_interval(entity_id.clone(), interval);
    follow_to_completion(monitor, entity_id).await;
    Ok(())
}

/// Print state transitions until the completion event arrives
async fn follow_to_completion(monitor: &BuildMonitor, entity_id: &EntityId) {
    let mut events = monitor.subscribe();
    let mut last_state: Option<BuildState> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) if event.entity_id == *entity_id => {
                        match event.outcome {
                            BuildOutcome::Succeeded => {
                                println!("{} Build finished", "✓".green().bold());
                            }
                            BuildOutcome::Failed { message } => {
                                let detail = message.unwrap_or_else(|| "no detail".to_string());
                                println!("{} Build failed: {}", "✗".red().bold(), detail);
                            }
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if let Some(status) = monitor.status(entity_id)
                    && last_state != Some(status.state)
                {
                    print_status(&status);
                    last_state = Some(status.state);
                }
            }
        }
    }
}

/// Print one status line
fn print_status(status: &BuildStatus) {
    let state_colored = colorize_state(status.state);

    println!(
        "  {} {}  {}",
        "▸".cyan(),
        status.entity_id.to_string().dimmed(),
        state_colored
    );
    if let Some(progress) = status.progress {
        println!("    Progress: {progress}%");
    }
    if let Some(message) = &status.message {
        println!("    Message:  {}", message.dimmed());
    }
    if let Some(entry) = &status.entry_id {
        println!("    Entry:    {}", entry.dimmed());
    }
}

/// Color a build state for terminal output
fn colorize_state(state: BuildState) -> ColoredString {
    match state {
        BuildState::Queued => "queued".yellow(),
        BuildState::Running => "running".cyan(),
        BuildState::Ok => "ok".green(),
        BuildState::Error => "error".red(),
        BuildState::Unknown => "unknown".dimmed(),
    }
}
