//! Build endpoint methods

use crate::error::{ClientError, Result};
use crate::BackendClient;
use segbuild_core::domain::build::{BuildStatus, EntityId};
use segbuild_core::dto::build::{BuildStatusResponse, RunBuildRequest, RunReply};
use tracing::debug;

impl BackendClient {
    /// Request a build of the given segment
    ///
    /// The backend answers in one of two shapes, normalized here into a
    /// [`RunReply`]: accepted for asynchronous processing, or completed
    /// synchronously within the request. A 2xx body matching neither
    /// shape is a parse error; a non-2xx status is an API error.
    ///
    /// # Arguments
    /// * `entity_id` - The segment to build
    /// * `materialize` - Whether to persist the materialized audience
    pub async fn run_now(&self, entity_id: &EntityId, materialize: bool) -> Result<RunReply> {
        let url = format!("{}/segments/{}/builds/run-now", self.base_url, entity_id);
        debug!(entity = %entity_id, materialize, "requesting build run");

        let response = self
            .client
            .post(&url)
            .json(&RunBuildRequest { materialize })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {e}")))?;

        RunReply::from_body(&body).ok_or_else(|| {
            ClientError::ParseError(format!(
                "run-now response matched neither the accepted nor the sync shape: {body}"
            ))
        })
    }

    /// Fetch the current build status of the given segment
    ///
    /// Unknown or absent status values map to `BuildState::Unknown`,
    /// never an error; only transport and non-2xx failures surface.
    pub async fn fetch_status(&self, entity_id: &EntityId) -> Result<BuildStatus> {
        let url = format!("{}/segments/{}/builds/status", self.base_url, entity_id);
        let response = self.client.get(&url).send().await?;

        let body: BuildStatusResponse = self.handle_response(response).await?;
        Ok(body.into_status(entity_id.clone()))
    }
}
