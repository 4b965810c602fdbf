//! Domain types
//!
//! Core business entities shared across the client, the tracker and the CLI.

pub mod backoff;
pub mod build;
