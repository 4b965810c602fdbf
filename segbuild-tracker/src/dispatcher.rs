//! Run dispatcher
//!
//! Starts a build and normalizes the backend's dual response shape
//! into one of three flows: enqueued (polling takes over), completed
//! synchronously (no polling ever starts), or failed (reported to the
//! caller, nothing mutated).

use std::sync::Arc;

use segbuild_client::BuildApi;
use segbuild_core::domain::build::{BuildStatus, EntityId};
use segbuild_core::dto::build::{RunReply, SyncStatus};
use tokio::time::Duration;
use tracing::{info, warn};

use crate::monitor::{BuildMonitor, DEFAULT_POLL_INTERVAL};

/// Result of a run request
///
/// `Failed` is always returned to the caller, never thrown, and is
/// never retried here: retrying a start request is a caller decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Accepted for asynchronous processing; the monitor is now
    /// polling the entity
    Enqueued { entry_id: Option<String> },
    /// Finished within the run request itself; no poller was created
    CompletedSync { result: Option<serde_json::Value> },
    /// The run request did not start a build; the status table was not
    /// touched
    Failed { reason: String },
}

/// Dispatches run requests and hands asynchronous builds to the monitor
pub struct RunDispatcher {
    api: Arc<dyn BuildApi>,
    monitor: BuildMonitor,
    poll_interval: Duration,
}

impl RunDispatcher {
    pub fn new(api: Arc<dyn BuildApi>, monitor: BuildMonitor) -> Self {
        Self {
            api,
            monitor,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the interval used when tracking enqueued builds
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start a build for the given entity
    ///
    /// The status table is seeded before the outcome is returned, so an
    /// observer reacting to the outcome already sees consistent status:
    /// - accepted: seed `{queued, entry_id}`, start tracking, return
    ///   [`RunOutcome::Enqueued`]
    /// - synchronous ok: seed `{ok, progress: 100}`, return
    ///   [`RunOutcome::CompletedSync`] without ever creating a poller
    /// - anything else: return [`RunOutcome::Failed`] with no mutation
    pub async fn start(&self, entity_id: &EntityId, materialize: bool) -> RunOutcome {
        let reply = match self.api.run_now(entity_id, materialize).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(entity = %entity_id, error = %e, "run request failed");
                return RunOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match reply {
            RunReply::Accepted { entry_id } => {
                self.monitor
                    .table()
                    .seed(BuildStatus::queued(entity_id.clone(), entry_id.clone()));
                self.monitor
                    .track_with_interval(entity_id.clone(), self.poll_interval);
                info!(entity = %entity_id, entry = ?entry_id, "build enqueued");
                RunOutcome::Enqueued { entry_id }
            }
            RunReply::Sync {
                status: SyncStatus::Ok,
                result,
                ..
            } => {
                self.monitor
                    .table()
                    .seed(BuildStatus::completed(entity_id.clone()));
                info!(entity = %entity_id, "build completed synchronously");
                RunOutcome::CompletedSync { result }
            }
            RunReply::Sync {
                status: SyncStatus::Error,
                error,
                ..
            } => {
                let reason =
                    error.unwrap_or_else(|| "build failed synchronously".to_string());
                warn!(entity = %entity_id, reason = %reason, "synchronous build failure");
                RunOutcome::Failed { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use segbuild_client::error::ClientError;
    use segbuild_core::domain::build::BuildState;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Fake backend with a fixed run reply and a scripted sequence of
    /// post-enqueue poll states
    struct FakeBackend {
        reply: Mutex<Option<segbuild_client::Result<RunReply>>>,
        poll_states: Mutex<Vec<BuildState>>,
    }

    impl FakeBackend {
        fn new(reply: segbuild_client::Result<RunReply>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                poll_states: Mutex::new(vec![BuildState::Queued]),
            }
        }

        fn with_poll_states(self, states: Vec<BuildState>) -> Self {
            *self.poll_states.lock().unwrap() = states;
            self
        }
    }

    #[async_trait]
    impl BuildApi for FakeBackend {
        async fn fetch_status(&self, entity_id: &EntityId) -> segbuild_client::Result<BuildStatus> {
            let state = {
                let mut states = self.poll_states.lock().unwrap();
                if states.len() > 1 {
                    states.remove(0)
                } else {
                    states[0]
                }
            };
            Ok(BuildStatus {
                entity_id: entity_id.clone(),
                state,
                progress: None,
                message: None,
                entry_id: Some("abc".to_string()),
                updated_at: chrono::Utc::now(),
            })
        }

        async fn run_now(
            &self,
            _entity_id: &EntityId,
            _materialize: bool,
        ) -> segbuild_client::Result<RunReply> {
            self.reply
                .lock()
                .unwrap()
                .take()
                .expect("run_now called more than once")
        }
    }

    fn dispatcher_with(api: Arc<FakeBackend>) -> (BuildMonitor, RunDispatcher) {
        let monitor = BuildMonitor::new(api.clone());
        let dispatcher = RunDispatcher::new(api, monitor.clone())
            .with_poll_interval(Duration::from_millis(10));
        (monitor, dispatcher)
    }

    #[tokio::test]
    async fn test_sync_completion_short_circuits_polling() {
        let api = Arc::new(FakeBackend::new(Ok(RunReply::Sync {
            status: SyncStatus::Ok,
            error: None,
            result: Some(json!({"rows": 7})),
        })));
        let (monitor, dispatcher) = dispatcher_with(api);
        let id = EntityId::from("seg-1");

        let outcome = dispatcher.start(&id, true).await;
        assert_eq!(
            outcome,
            RunOutcome::CompletedSync {
                result: Some(json!({"rows": 7}))
            }
        );

        let status = monitor.status(&id).unwrap();
        assert_eq!(status.state, BuildState::Ok);
        assert_eq!(status.progress, Some(100));

        // No poller is ever created for the synchronous path.
        assert!(!monitor.is_tracking(&id));
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_async_happy_path() {
        let api = Arc::new(
            FakeBackend::new(Ok(RunReply::Accepted {
                entry_id: Some("abc".to_string()),
            }))
            .with_poll_states(vec![
                BuildState::Queued,
                BuildState::Running,
                BuildState::Ok,
            ]),
        );
        let (monitor, dispatcher) = dispatcher_with(api);
        let id = EntityId::from("seg-1");
        let mut events = monitor.subscribe();

        let outcome = dispatcher.start(&id, false).await;
        assert_eq!(
            outcome,
            RunOutcome::Enqueued {
                entry_id: Some("abc".to_string())
            }
        );

        // Seeded before the outcome was returned.
        let seeded = monitor.status(&id).unwrap();
        assert_eq!(seeded.entry_id.as_deref(), Some("abc"));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("expected a completion event")
            .expect("event channel closed");
        assert_eq!(event.outcome, crate::BuildOutcome::Succeeded);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(monitor.status(&id).unwrap().state, BuildState::Ok);
        assert!(!monitor.is_tracking(&id));
    }

    #[tokio::test]
    async fn test_enqueued_with_null_entry_id() {
        let api = Arc::new(
            FakeBackend::new(Ok(RunReply::Accepted { entry_id: None }))
                .with_poll_states(vec![BuildState::Queued]),
        );
        let (monitor, dispatcher) = dispatcher_with(api);
        let id = EntityId::from("seg-1");

        let outcome = dispatcher.start(&id, false).await;
        assert_eq!(outcome, RunOutcome::Enqueued { entry_id: None });
        assert_eq!(monitor.status(&id).unwrap().state, BuildState::Queued);
        assert!(monitor.is_tracking(&id));

        monitor.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_failure_mutates_nothing() {
        let api = Arc::new(FakeBackend::new(Err(ClientError::api_error(
            500,
            "segment storage offline",
        ))));
        let (monitor, dispatcher) = dispatcher_with(api);
        let id = EntityId::from("seg-1");

        let outcome = dispatcher.start(&id, false).await;
        match outcome {
            RunOutcome::Failed { reason } => {
                assert!(reason.contains("segment storage offline"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }

        assert!(monitor.status(&id).is_none());
        assert!(!monitor.is_tracking(&id));
    }

    #[tokio::test]
    async fn test_sync_error_reports_reason_without_mutation() {
        let api = Arc::new(FakeBackend::new(Ok(RunReply::Sync {
            status: SyncStatus::Error,
            error: Some("query too broad".to_string()),
            result: None,
        })));
        let (monitor, dispatcher) = dispatcher_with(api);
        let id = EntityId::from("seg-1");

        let outcome = dispatcher.start(&id, false).await;
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                reason: "query too broad".to_string()
            }
        );
        assert!(monitor.status(&id).is_none());
        assert!(!monitor.is_tracking(&id));
    }
}
