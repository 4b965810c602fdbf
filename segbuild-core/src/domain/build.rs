//! Build domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the entity being built (e.g. a segment)
///
/// Opaque and caller-supplied; the backend assigns no structure to it
/// that this client relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Build lifecycle state
///
/// `Ok` and `Error` are terminal; `Unknown` is the state before any
/// successful status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Unknown,
    Queued,
    Running,
    Ok,
    Error,
}

impl BuildState {
    /// Parses a wire status string
    ///
    /// Total: anything the backend sends that is not one of the four
    /// known states maps to `Unknown`, never an error.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "ok" => Self::Ok,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Whether this state ends the build lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Error)
    }

    /// Whether the build is still in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Latest known state of one background build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub entity_id: EntityId,
    pub state: BuildState,
    /// Percent complete, 0-100; reported by the backend only while the
    /// build is queued or running
    pub progress: Option<u8>,
    pub message: Option<String>,
    /// Token correlating this status with the enqueue request that
    /// started the build; a new enqueue yields a new entry id
    pub entry_id: Option<String>,
    /// Server-reported timestamp when present, otherwise the time of
    /// the successful status read
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl BuildStatus {
    /// Status of an entity before any successful poll
    pub fn unknown(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            state: BuildState::Unknown,
            progress: None,
            message: None,
            entry_id: None,
            updated_at: chrono::Utc::now(),
        }
    }

    /// Freshly enqueued build, seeded from an accepted run request
    pub fn queued(entity_id: EntityId, entry_id: Option<String>) -> Self {
        Self {
            entity_id,
            state: BuildState::Queued,
            progress: None,
            message: None,
            entry_id,
            updated_at: chrono::Utc::now(),
        }
    }

    /// Build that finished within the run request itself
    pub fn completed(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            state: BuildState::Ok,
            progress: Some(100),
            message: None,
            entry_id: None,
            updated_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_states() {
        assert_eq!(BuildState::parse("queued"), BuildState::Queued);
        assert_eq!(BuildState::parse("running"), BuildState::Running);
        assert_eq!(BuildState::parse("ok"), BuildState::Ok);
        assert_eq!(BuildState::parse("error"), BuildState::Error);
    }

    #[test]
    fn test_parse_unknown_states() {
        assert_eq!(BuildState::parse(""), BuildState::Unknown);
        assert_eq!(BuildState::parse("QUEUED"), BuildState::Unknown);
        assert_eq!(BuildState::parse("finished"), BuildState::Unknown);
    }

    #[test]
    fn test_terminal_states() {
        assert!(BuildState::Ok.is_terminal());
        assert!(BuildState::Error.is_terminal());
        assert!(!BuildState::Queued.is_terminal());
        assert!(!BuildState::Running.is_terminal());
        assert!(!BuildState::Unknown.is_terminal());
    }

    #[test]
    fn test_active_states() {
        assert!(BuildState::Queued.is_active());
        assert!(BuildState::Running.is_active());
        assert!(!BuildState::Ok.is_active());
        assert!(!BuildState::Unknown.is_active());
    }

    #[test]
    fn test_completed_status_carries_full_progress() {
        let status = BuildStatus::completed(EntityId::from("seg-1"));
        assert_eq!(status.state, BuildState::Ok);
        assert_eq!(status.progress, Some(100));
    }
}
