//! Segbuild HTTP Client
//!
//! A simple, type-safe HTTP client for the backend segment build API.
//!
//! This crate provides the network boundary for build tracking: one
//! stateless client over the two build endpoints (run-now and status),
//! plus the [`BuildApi`] trait seam the tracker depends on so tests can
//! substitute a fake backend.
//!
//! # Example
//!
//! ```no_run
//! use segbuild_client::BackendClient;
//! use segbuild_core::domain::build::EntityId;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BackendClient::new("http://localhost:8080");
//!
//!     let status = client.fetch_status(&EntityId::from("seg-1")).await?;
//!     println!("segment seg-1 is {}", status.state);
//!     Ok(())
//! }
//! ```

mod api;
mod builds;
pub mod error;

// Re-export commonly used types
pub use api::BuildApi;
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the backend build API
///
/// Stateless: holds only the base URL and the underlying connection
/// pool. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL of the backend (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use segbuild_client::BackendClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = BackendClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    ///
    /// Checks the status code and returns an appropriate error if the
    /// request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {e}")))
    }
}
