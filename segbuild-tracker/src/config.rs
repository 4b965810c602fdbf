//! Tracker configuration
//!
//! Defines the configurable parameters for build tracking: where the
//! backend lives and how often pollers tick.

use std::time::Duration;

use crate::monitor::DEFAULT_POLL_INTERVAL;

/// Tracker configuration
///
/// The poll interval is configurable to allow tuning for different
/// deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL (e.g., "http://localhost:8080")
    pub backend_url: String,

    /// How often each poller checks the build status of its entity
    pub poll_interval: Duration,
}

impl Config {
    /// Creates a new configuration with the default poll interval
    pub fn new(backend_url: String) -> Self {
        Self {
            backend_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Loads configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SEGBUILD_BACKEND_URL (required)
    /// - SEGBUILD_POLL_INTERVAL_MS (optional, milliseconds, default: 2500)
    pub fn from_env() -> anyhow::Result<Self> {
        let backend_url = std::env::var("SEGBUILD_BACKEND_URL")
            .map_err(|_| anyhow::anyhow!("SEGBUILD_BACKEND_URL environment variable not set"))?;

        let poll_interval = std::env::var("SEGBUILD_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Ok(Self {
            backend_url,
            poll_interval,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend_url.is_empty() {
            anyhow::bail!("backend_url cannot be empty");
        }

        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            anyhow::bail!("backend_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}
