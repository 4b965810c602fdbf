//! Build monitor
//!
//! Maintains at most one polling task per entity and keeps the shared
//! status table current until each build resolves. Each tracked entity
//! gets its own repeating task; ticks for one entity are strictly
//! sequential, and entities never coordinate with each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use segbuild_client::BuildApi;

use crate::table::StatusTable;
use segbuild_core::domain::build::{BuildState, BuildStatus, EntityId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, info};

/// Default spacing between status polls for one entity
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One-time notification that a tracked build reached a terminal state
///
/// Emitted exactly once per completed lifecycle, distinct from the
/// continuous status-table updates, so observers can react once per
/// build rather than once per poll tick.
#[derive(Debug, Clone)]
pub struct BuildEvent {
    pub entity_id: EntityId,
    pub entry_id: Option<String>,
    pub outcome: BuildOutcome,
}

/// How a build lifecycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed { message: Option<String> },
}

/// Process-local record of one active polling loop
struct PollerHandle {
    handle: JoinHandle<()>,
    epoch: u64,
    #[allow(dead_code)]
    interval: Duration,
}

/// Registry of active pollers
///
/// The epoch distinguishes poller generations for the same entity: a
/// poll result is only committed while its epoch is still registered,
/// so a request that was in flight when the poller was cancelled can
/// never be applied afterwards.
#[derive(Default)]
struct PollerRegistry {
    pollers: Mutex<HashMap<EntityId, PollerHandle>>,
    next_epoch: AtomicU64,
}

impl PollerRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EntityId, PollerHandle>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a polled status while the poller is still current
    ///
    /// On a terminal status the poller is also deregistered, under the
    /// same lock, so no later write for this lifecycle can follow.
    /// Returns `None` when the poller has been cancelled or superseded
    /// (the result is discarded), otherwise whether the table accepted
    /// the write.
    fn commit_poll(
        &self,
        entity_id: &EntityId,
        epoch: u64,
        table: &StatusTable,
        status: BuildStatus,
    ) -> Option<bool> {
        let mut pollers = self.lock();
        match pollers.get(entity_id) {
            Some(handle) if handle.epoch == epoch => {}
            _ => return None,
        }

        let terminal = status.state.is_terminal();
        let applied = table.apply(status);
        if terminal {
            // The task breaks out of its loop right after this commit;
            // the JoinHandle is simply detached, not aborted.
            pollers.remove(entity_id);
        }
        Some(applied)
    }

    fn remove_and_abort(&self, entity_id: &EntityId) -> bool {
        let removed = self.lock().remove(entity_id);
        match removed {
            Some(poller) => {
                poller.handle.abort();
                true
            }
            None => false,
        }
    }

    fn abort_all(&self) {
        for (_, poller) in self.lock().drain() {
            poller.handle.abort();
        }
    }
}

impl Drop for PollerRegistry {
    fn drop(&mut self) {
        // No timer may fire once the last monitor handle is gone.
        self.abort_all();
    }
}

/// Tracks asynchronous builds by polling the backend status endpoint
///
/// Owns the poller registry and the completion-event channel. Cheap to
/// clone; clones share the same registry and table. Tracking is
/// idempotent per entity, terminal states deregister the poller, and
/// dropping the last clone cancels every outstanding poller.
#[derive(Clone)]
pub struct BuildMonitor {
    api: Arc<dyn BuildApi>,
    table: StatusTable,
    registry: Arc<PollerRegistry>,
    events: broadcast::Sender<BuildEvent>,
}

impl BuildMonitor {
    /// Creates a monitor with its own empty status table
    pub fn new(api: Arc<dyn BuildApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            table: StatusTable::new(),
            registry: Arc::new(PollerRegistry::default()),
            events,
        }
    }

    /// The shared status table
    pub fn table(&self) -> &StatusTable {
        &self.table
    }

    /// Last known status for an entity
    pub fn status(&self, entity_id: &EntityId) -> Option<BuildStatus> {
        self.table.get(entity_id)
    }

    /// Subscribe to one-time build completion events
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    /// Whether an active poller exists for the entity
    pub fn is_tracking(&self, entity_id: &EntityId) -> bool {
        self.registry.lock().contains_key(entity_id)
    }

    /// Number of active pollers
    pub fn tracked_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Start polling an entity at the default interval
    ///
    /// Idempotent: if a poller already exists for the entity this is a
    /// no-op, so multiple callers priming the same build never race two
    /// timers against one status entry.
    pub fn track(&self, entity_id: EntityId) {
        self.track_with_interval(entity_id, DEFAULT_POLL_INTERVAL);
    }

    /// Start polling an entity at a custom interval
    ///
    /// The first poll fires immediately so state is available without
    /// waiting a full interval; subsequent polls follow the interval.
    pub fn track_with_interval(&self, entity_id: EntityId, interval: Duration) {
        let mut pollers = self.registry.lock();
        if pollers.contains_key(&entity_id) {
            debug!(entity = %entity_id, "already tracking, ignoring duplicate track request");
            return;
        }

        let epoch = self.registry.next_epoch.fetch_add(1, Ordering::Relaxed);
        let handle = self.spawn_poller(entity_id.clone(), epoch, interval);
        pollers.insert(
            entity_id.clone(),
            PollerHandle {
                handle,
                epoch,
                interval,
            },
        );
        info!(entity = %entity_id, ?interval, "tracking build");
    }

    /// Perform a single status poll outside the repeating loop
    ///
    /// On success the result is merged into the table; a terminal
    /// status also cancels any active poller and emits the completion
    /// event. Failures leave the table untouched and surface only to
    /// this caller.
    pub async fn poll_once(&self, entity_id: &EntityId) -> segbuild_client::Result<BuildStatus> {
        let status = self.api.fetch_status(entity_id).await?;

        let terminal = status.state.is_terminal();
        let event = event_for(&status);
        let applied = self.table.apply(status.clone());
        if terminal {
            self.registry.remove_and_abort(entity_id);
            if applied && let Some(event) = event {
                let _ = self.events.send(event);
            }
        }
        Ok(status)
    }

    /// Stop polling an entity
    ///
    /// Safe to call when no poller is active. A poll request already in
    /// flight is discarded when it resolves, never applied.
    pub fn untrack(&self, entity_id: &EntityId) {
        if self.registry.remove_and_abort(entity_id) {
            debug!(entity = %entity_id, "stopped tracking build");
        }
    }

    /// Cancel every outstanding poller
    pub fn shutdown(&self) {
        self.registry.abort_all();
        info!("build monitor shut down");
    }

    fn spawn_poller(&self, entity_id: EntityId, epoch: u64, interval: Duration) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let table = self.table.clone();
        let registry = Arc::downgrade(&self.registry);
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // A hung request delays the next tick; it never earns a
            // burst of catch-up polls.
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let result = api.fetch_status(&entity_id).await;

                // The monitor may have been disposed while the request
                // was in flight.
                let Some(registry) = registry.upgrade() else {
                    break;
                };

                match result {
                    Ok(status) => {
                        let terminal = status.state.is_terminal();
                        let event = event_for(&status);

                        match registry.commit_poll(&entity_id, epoch, &table, status) {
                            None => {
                                debug!(entity = %entity_id, "poller cancelled, discarding poll result");
                                break;
                            }
                            Some(applied) => {
                                if terminal {
                                    info!(entity = %entity_id, "build reached terminal state");
                                    if applied && let Some(event) = event {
                                        let _ = events.send(event);
                                    }
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // A single missed poll is not evidence the build
                        // failed; keep the previous status and stay on
                        // schedule.
                        debug!(entity = %entity_id, error = %e, "status poll failed, keeping previous status");
                    }
                }
            }
        })
    }
}

/// Completion event for a terminal status, `None` otherwise
fn event_for(status: &BuildStatus) -> Option<BuildEvent> {
    let outcome = match status.state {
        BuildState::Ok => BuildOutcome::Succeeded,
        BuildState::Error => BuildOutcome::Failed {
            message: status.message.clone(),
        },
        _ => return None,
    };
    Some(BuildEvent {
        entity_id: status.entity_id.clone(),
        entry_id: status.entry_id.clone(),
        outcome,
    })
}
