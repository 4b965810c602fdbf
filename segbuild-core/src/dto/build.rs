//! Build endpoint DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::build::{BuildState, BuildStatus, EntityId};

/// Request body for `POST /segments/{id}/builds/run-now`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBuildRequest {
    pub materialize: bool,
}

/// Outcome reported inside a synchronous run response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Ok,
    Error,
}

/// Normalized run-now response
///
/// The backend answers a run request in one of two shapes: accepted for
/// asynchronous processing (202 with an entry id) or completed within
/// the request itself (200 with a sync body). This enum makes the dual
/// contract a first-class value instead of ad hoc field checks at each
/// call site.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReply {
    /// Enqueued for asynchronous processing; the entry id correlates
    /// later status reads with this enqueue (the backend may omit it)
    Accepted { entry_id: Option<String> },
    /// Finished within the request; no polling will ever be needed
    Sync {
        status: SyncStatus,
        error: Option<String>,
        result: Option<Value>,
    },
}

impl RunReply {
    /// Classifies a successful (2xx) run-now response body
    ///
    /// The sync shape wins when `mode` is `"sync"`; otherwise the
    /// accepted shape requires an `entryId` key (its value may be
    /// null). A body matching neither returns `None`, which the client
    /// surfaces as a parse error.
    pub fn from_body(body: &Value) -> Option<Self> {
        let obj = body.as_object()?;

        if obj.get("mode").and_then(Value::as_str) == Some("sync") {
            let status = match obj.get("status").and_then(Value::as_str) {
                Some("ok") => SyncStatus::Ok,
                Some("error") => SyncStatus::Error,
                _ => return None,
            };
            return Some(Self::Sync {
                status,
                error: obj
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                result: obj.get("result").cloned().filter(|v| !v.is_null()),
            });
        }

        if obj.contains_key("entryId") {
            return Some(Self::Accepted {
                entry_id: obj
                    .get("entryId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        None
    }
}

/// Response body of `GET /segments/{id}/builds/status`
///
/// Every field is optional on the wire; [`Self::into_status`] is the
/// single totalizing conversion to the domain type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatusResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub entry_id: Option<String>,
    pub progress: Option<u8>,
}

impl BuildStatusResponse {
    /// Converts the wire shape into a [`BuildStatus`]
    ///
    /// Absent or unrecognized status strings become `Unknown`; a
    /// missing timestamp is filled with the time of this read so
    /// last-write-wins ordering is always decidable.
    pub fn into_status(self, entity_id: EntityId) -> BuildStatus {
        let state = self
            .status
            .as_deref()
            .map_or(BuildState::Unknown, BuildState::parse);
        BuildStatus {
            entity_id,
            state,
            progress: self.progress,
            message: self.message,
            entry_id: self.entry_id,
            updated_at: self.updated_at.unwrap_or_else(chrono::Utc::now),
        }
    }
}
