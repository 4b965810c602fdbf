//! Build API trait seam
//!
//! The tracker consumes the backend through this trait so its polling
//! and dispatch logic can be exercised against a fake backend in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::BackendClient;
use segbuild_core::domain::build::{BuildStatus, EntityId};
use segbuild_core::dto::build::RunReply;

/// The two backend calls build tracking depends on
#[async_trait]
pub trait BuildApi: Send + Sync {
    /// Fetch the current build status of an entity
    async fn fetch_status(&self, entity_id: &EntityId) -> Result<BuildStatus>;

    /// Request a build, returning the normalized dual-shape reply
    async fn run_now(&self, entity_id: &EntityId, materialize: bool) -> Result<RunReply>;
}

#[async_trait]
impl BuildApi for BackendClient {
    async fn fetch_status(&self, entity_id: &EntityId) -> Result<BuildStatus> {
        BackendClient::fetch_status(self, entity_id).await
    }

    async fn run_now(&self, entity_id: &EntityId, materialize: bool) -> Result<RunReply> {
        BackendClient::run_now(self, entity_id, materialize).await
    }
}
