//! Scheduler collaborator.
//!
//! The scheduler mirrors a policy's time-based rules. It is keyed by app id
//! and told the policy GUID on every write so it can discard stale updates.

use async_trait::async_trait;
use http::{Method, StatusCode};
use tracing::{debug, info};

use autoscaler_core::ScalingPolicy;

use crate::client::{UpstreamClient, path_segment};
use crate::error::ScheduleError;

/// Keeps the scheduler's copy of an app's schedules in step with its policy.
#[async_trait]
pub trait ScheduleClient: Send + Sync {
    /// Create or replace the schedules for `app_id` at version `guid`.
    async fn create_or_update_schedule(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> Result<(), ScheduleError>;

    /// Drop every schedule of `app_id`. Succeeds when there is none.
    async fn delete_schedule(&self, app_id: &str) -> Result<(), ScheduleError>;
}

/// `ScheduleClient` over the scheduler's REST API.
#[derive(Clone)]
pub struct HttpScheduleClient {
    base_url: String,
    http: UpstreamClient,
}

impl HttpScheduleClient {
    pub fn new(scheduler_url: &str, http: UpstreamClient) -> Self {
        Self {
            base_url: scheduler_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn schedules_url(&self, app_id: &str) -> String {
        format!("{}/v1/apps/{}/schedules", self.base_url, path_segment(app_id))
    }
}

#[async_trait]
impl ScheduleClient for HttpScheduleClient {
    async fn create_or_update_schedule(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> Result<(), ScheduleError> {
        if !policy.has_schedules() {
            debug!(%app_id, "policy has no schedules, clearing scheduler state");
            return self.delete_schedule(app_id).await;
        }

        let url = format!("{}?guid={}", self.schedules_url(app_id), path_segment(guid));
        let body = serde_json::to_vec(policy)?;
        let resp = self.http.send(Method::PUT, &url, Some(body)).await?;
        match resp.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                info!(%app_id, %guid, "schedules created/updated");
                Ok(())
            }
            status => Err(ScheduleError::Rejected {
                action: "creation/update",
                status,
                body: String::from_utf8_lossy(&resp.body).into_owned(),
            }),
        }
    }

    async fn delete_schedule(&self, app_id: &str) -> Result<(), ScheduleError> {
        let resp = self
            .http
            .send(Method::DELETE, &self.schedules_url(app_id), None)
            .await?;
        match resp.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                info!(%app_id, "schedules deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(%app_id, "no schedules to delete");
                Ok(())
            }
            status => Err(ScheduleError::Rejected {
                action: "deletion",
                status,
                body: String::from_utf8_lossy(&resp.body).into_owned(),
            }),
        }
    }
}
