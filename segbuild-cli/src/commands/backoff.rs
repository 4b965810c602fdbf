//! Backoff command handlers
//!
//! Encode and decode webhook retry backoff policies from the shell,
//! using the same codec the editor and the delivery worker rely on.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use segbuild_core::domain::backoff::BackoffPolicy;

/// Backoff subcommands
#[derive(Subcommand)]
pub enum BackoffCommands {
    /// Decode a stored policy string into its structured form
    Decode {
        /// Policy string (e.g. "exponential:2,60,3600")
        value: String,
    },
    /// Encode a structured policy into its canonical string form
    Encode {
        #[command(subcommand)]
        policy: EncodePolicy,
    },
}

/// Structured policy to encode
#[derive(Subcommand)]
pub enum EncodePolicy {
    /// Delay multiplies by FACTOR each attempt, clamped to [MIN, MAX]
    Exponential {
        factor: u64,
        min_seconds: u64,
        max_seconds: u64,
    },
    /// Constant delay
    Fixed { seconds: u64 },
    /// Delay grows by STEP each attempt from BASE, capped at MAX
    Linear {
        base_seconds: u64,
        step_seconds: u64,
        max_seconds: u64,
    },
    /// Pass a raw string through unvalidated
    Custom { raw: String },
}

/// Handle backoff commands
pub fn handle_backoff_command(command: BackoffCommands) -> Result<()> {
    match command {
        BackoffCommands::Decode { value } => decode_policy(&value),
        BackoffCommands::Encode { policy } => encode_policy(policy),
    }
}

/// Decode and display a stored policy string
fn decode_policy(value: &str) -> Result<()> {
    let policy = BackoffPolicy::decode(value);

    println!("{}", "Decoded policy:".bold());
    match &policy {
        BackoffPolicy::Exponential {
            factor,
            min_seconds,
            max_seconds,
        } => {
            println!("  Mode:   {}", "exponential".cyan());
            println!("  Factor: {factor}");
            println!("  Min:    {min_seconds}s");
            println!("  Max:    {max_seconds}s");
        }
        BackoffPolicy::Fixed { seconds } => {
            println!("  Mode:    {}", "fixed".cyan());
            println!("  Seconds: {seconds}s");
        }
        BackoffPolicy::Linear {
            base_seconds,
            step_seconds,
            max_seconds,
        } => {
            println!("  Mode: {}", "linear".cyan());
            println!("  Base: {base_seconds}s");
            println!("  Step: {step_seconds}s");
            println!("  Max:  {max_seconds}s");
        }
        BackoffPolicy::Custom { raw } => {
            println!("  Mode: {}", "custom".yellow());
            println!("  Raw:  {raw}");
        }
    }
    println!("  Canonical: {}", policy.encode().dimmed());

    if policy.delay_for_attempt(0).is_some() {
        let delays: Vec<String> = (0..5)
            .filter_map(|attempt| policy.delay_for_attempt(attempt))
            .map(|d| format!("{}s", d.as_secs()))
            .collect();
        println!("  First delays: {}", delays.join(", ").dimmed());
    }

    Ok(())
}

/// Encode a structured policy and print the canonical string
fn encode_policy(policy: EncodePolicy) -> Result<()> {
    let policy = match policy {
        EncodePolicy::Exponential {
            factor,
            min_seconds,
            max_seconds,
        } => BackoffPolicy::Exponential {
            factor,
            min_seconds,
            max_seconds,
        },
        EncodePolicy::Fixed { seconds } => BackoffPolicy::Fixed { seconds },
        EncodePolicy::Linear {
            base_seconds,
            step_seconds,
            max_seconds,
        } => BackoffPolicy::Linear {
            base_seconds,
            step_seconds,
            max_seconds,
        },
        EncodePolicy::Custom { raw } => BackoffPolicy::Custom { raw },
    };

    println!("{}", policy.encode());
    Ok(())
}
