//! Configuration module
//!
//! Handles CLI configuration including the backend URL.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the backend build API
    pub backend_url: String,
}
