//! Segbuild CLI
//!
//! Command-line interface for the segment build backend: start builds,
//! inspect and watch their status, and work with webhook retry backoff
//! policies.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "segbuild")]
#[command(about = "Segment build tracking CLI", long_about = None)]
struct Cli {
    /// Backend URL
    #[arg(
        long,
        env = "SEGBUILD_BACKEND_URL",
        default_value = "http://localhost:8080"
    )]
    backend_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segbuild_tracker=warn,segbuild_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config {
        backend_url: cli.backend_url,
    };

    handle_command(cli.command, &config).await
}
