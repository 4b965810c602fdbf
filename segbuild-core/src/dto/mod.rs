//! Data Transfer Objects for the backend build API
//!
//! Wire shapes exchanged with the backend over HTTP. All "what if the
//! server sends garbage" handling lives here, in total conversions to
//! the domain types, so call sites never branch on raw JSON.

pub mod build;
