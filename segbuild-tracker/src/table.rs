//! Shared build status table
//!
//! The only cross-component shared state: readable from any thread,
//! written from poll tasks and the dispatcher seed path.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use segbuild_core::domain::build::{BuildStatus, EntityId};

/// Table of the last known status per entity
///
/// Cheap to clone; all clones share the same underlying map. Writes go
/// through [`Self::apply`], which enforces the two update rules:
///
/// - a terminal status is never overwritten by a later status carrying
///   the same entry id (the lifecycle is over)
/// - last-write-wins by `updated_at` (an older read is discarded),
///   except that a terminal status always replaces a non-terminal
///   entry regardless of timestamp
///
/// [`Self::seed`] bypasses both rules and is reserved for the dispatch
/// path, where a fresh enqueue legitimately restarts the lifecycle.
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    inner: Arc<RwLock<HashMap<EntityId, BuildStatus>>>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known status for an entity, if any poll or dispatch has
    /// produced one
    pub fn get(&self, entity_id: &EntityId) -> Option<BuildStatus> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
    }

    /// Snapshot of every tracked status
    pub fn snapshot(&self) -> Vec<BuildStatus> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge a polled status into the table
    ///
    /// Returns whether the write was applied; a rejected write leaves
    /// the previous entry untouched.
    pub fn apply(&self, status: BuildStatus) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(prev) = map.get(&status.entity_id) {
            if prev.state.is_terminal() && prev.entry_id == status.entry_id {
                return false;
            }
            // Timestamp ordering only arbitrates between non-terminal
            // reads: seeds carry the local clock while polls carry the
            // server's, and a server clock trailing the seed time must
            // not keep a finished build out of the table.
            if !status.state.is_terminal() && status.updated_at < prev.updated_at {
                return false;
            }
        }

        map.insert(status.entity_id.clone(), status);
        true
    }

    /// Force-set the status for an entity, starting a new lifecycle
    ///
    /// Used by the dispatcher when the backend has accepted a new
    /// enqueue (or completed one synchronously): the previous
    /// lifecycle's terminal guard no longer applies.
    pub fn seed(&self, status: BuildStatus) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(status.entity_id.clone(), status);
    }

    /// Remove an entity's status entirely
    pub fn remove(&self, entity_id: &EntityId) -> Option<BuildStatus> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use segbuild_core::domain::build::BuildState;

    fn status(id: &str, state: BuildState, entry: Option<&str>) -> BuildStatus {
        BuildStatus {
            entity_id: EntityId::from(id),
            state,
            progress: None,
            message: None,
            entry_id: entry.map(str::to_string),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_inserts_and_reads_back() {
        let table = StatusTable::new();
        assert!(table.apply(status("seg-1", BuildState::Queued, Some("e1"))));

        let read = table.get(&EntityId::from("seg-1")).unwrap();
        assert_eq!(read.state, BuildState::Queued);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_terminal_not_overwritten_for_same_entry() {
        let table = StatusTable::new();
        table.seed(status("seg-1", BuildState::Ok, Some("e1")));

        let mut late = status("seg-1", BuildState::Running, Some("e1"));
        late.updated_at = Utc::now() + Duration::seconds(10);
        assert!(!table.apply(late));
        assert_eq!(
            table.get(&EntityId::from("seg-1")).unwrap().state,
            BuildState::Ok
        );
    }

    #[test]
    fn test_new_entry_id_passes_terminal_guard() {
        let table = StatusTable::new();
        table.seed(status("seg-1", BuildState::Error, Some("e1")));

        let mut fresh = status("seg-1", BuildState::Queued, Some("e2"));
        fresh.updated_at = Utc::now() + Duration::seconds(10);
        assert!(table.apply(fresh));
        assert_eq!(
            table.get(&EntityId::from("seg-1")).unwrap().state,
            BuildState::Queued
        );
    }

    #[test]
    fn test_older_timestamp_is_discarded() {
        let table = StatusTable::new();
        table.seed(status("seg-1", BuildState::Running, Some("e1")));

        let mut stale = status("seg-1", BuildState::Queued, Some("e1"));
        stale.updated_at = Utc::now() - Duration::seconds(60);
        assert!(!table.apply(stale));
        assert_eq!(
            table.get(&EntityId::from("seg-1")).unwrap().state,
            BuildState::Running
        );
    }

    #[test]
    fn test_terminal_with_older_timestamp_replaces_non_terminal() {
        let table = StatusTable::new();
        // Seeded with the local clock; the server's clock may trail it.
        table.seed(status("seg-1", BuildState::Queued, Some("e1")));

        let mut done = status("seg-1", BuildState::Ok, Some("e1"));
        done.updated_at = Utc::now() - Duration::seconds(30);
        assert!(table.apply(done));
        assert_eq!(
            table.get(&EntityId::from("seg-1")).unwrap().state,
            BuildState::Ok
        );
    }

    #[test]
    fn test_seed_restarts_terminal_lifecycle() {
        let table = StatusTable::new();
        table.seed(status("seg-1", BuildState::Ok, None));
        // A re-enqueue without an entry id would be rejected by apply,
        // but seeding represents a brand-new lifecycle.
        table.seed(status("seg-1", BuildState::Queued, None));
        assert_eq!(
            table.get(&EntityId::from("seg-1")).unwrap().state,
            BuildState::Queued
        );
    }
}
