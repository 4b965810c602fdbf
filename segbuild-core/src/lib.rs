//! Segbuild Core
//!
//! Core types and abstractions for segment build tracking.
//!
//! This crate contains:
//! - Domain types: build status, build state, backoff policies
//! - DTOs: wire shapes exchanged with the backend build API

pub mod domain;
pub mod dto;
