//! Segbuild Tracker
//!
//! Client-side lifecycle management for asynchronous segment builds:
//! - [`StatusTable`]: the shared table of last known build statuses
//! - [`BuildMonitor`]: at most one polling task per entity, with
//!   terminal-state detection and one-time completion events
//! - [`RunDispatcher`]: starts a build and normalizes the backend's
//!   dual synchronous/asynchronous response into a three-way outcome
//!
//! The monitor owns every timer it creates: a poller is cancelled the
//! instant a terminal status is observed, on explicit `untrack`, and
//! when the last monitor handle is dropped.

mod config;
mod dispatcher;
mod monitor;
mod table;

pub use config::Config;
pub use dispatcher::{RunDispatcher, RunOutcome};
pub use monitor::{BuildEvent, BuildMonitor, BuildOutcome, DEFAULT_POLL_INTERVAL};
pub use table::StatusTable;
