//! autoscaler-api — public REST API of the autoscaler.
//!
//! Keeps an app's stored policy and its scheduler-side schedules in step,
//! restores a service instance's default policy when an explicit one is
//! detached, proxies history queries to internal services (rewriting their
//! pagination links), and manages metrics-ingestion credentials.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/policies/{app_id}` | Get the app's policy |
//! | PUT | `/policies/{app_id}` | Attach (create or replace) a policy |
//! | DELETE | `/policies/{app_id}` | Detach the policy, restoring a default policy if bound |
//! | GET | `/scaling_histories/{app_id}` | Scaling histories (scaling engine) |
//! | GET | `/metric_histories/{app_id}/{metric_type}` | Aggregated metric histories (event generator) |
//! | POST | `/credentials/{app_id}` | Create a metrics-ingestion credential |
//! | DELETE | `/credentials/{app_id}` | Delete the app's credential |
//! | GET | `/info` | Static API info document |
//! | GET | `/health` | Liveness |
//!
//! Policy store and scheduler writes are independent steps, not a
//! transaction: a stored policy is never rolled back because a later
//! scheduler call failed.

pub mod credential_handlers;
pub mod error;
pub mod handlers;
pub mod history_handlers;
pub mod pagination;
pub mod policy_handlers;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};

use autoscaler_core::{Config, PolicyValidator};
use autoscaler_state::{BindingStore, CredentialManager, PolicyStore};
use autoscaler_upstream::{ScheduleClient, UpstreamClient};

pub use error::{ApiError, ApiResult};

/// Shared state for API handlers. Every collaborator is injected; the
/// binding store is absent when no service broker is deployed.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub policies: Arc<dyn PolicyStore>,
    pub bindings: Option<Arc<dyn BindingStore>>,
    pub schedules: Arc<dyn ScheduleClient>,
    pub credentials: Arc<dyn CredentialManager>,
    pub validator: Arc<PolicyValidator>,
    pub upstream: UpstreamClient,
    /// Bound on each store or collaborator call made by a handler.
    pub call_timeout: Duration,
}

impl ApiState {
    pub fn new(
        config: Arc<Config>,
        policies: Arc<dyn PolicyStore>,
        schedules: Arc<dyn ScheduleClient>,
        credentials: Arc<dyn CredentialManager>,
    ) -> Self {
        let cpu = &config.scaling_rules.cpu;
        let validator = PolicyValidator::new(cpu.lower_threshold, cpu.upper_threshold);
        let call_timeout = config.http_timeout();
        Self {
            policies,
            bindings: None,
            schedules,
            credentials,
            validator: Arc::new(validator),
            upstream: UpstreamClient::new(call_timeout),
            call_timeout,
            config,
        }
    }

    /// Enable default-policy fallback on detach.
    pub fn with_bindings(mut self, bindings: Arc<dyn BindingStore>) -> Self {
        self.bindings = Some(bindings);
        self
    }
}

/// Build the public API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/policies/{app_id}",
            get(policy_handlers::get_policy)
                .put(policy_handlers::attach_policy)
                .delete(policy_handlers::detach_policy),
        )
        .route(
            "/scaling_histories/{app_id}",
            get(history_handlers::get_scaling_histories),
        )
        .route(
            "/metric_histories/{app_id}/{metric_type}",
            get(history_handlers::get_aggregated_metric_histories),
        )
        .route(
            "/credentials/{app_id}",
            post(credential_handlers::create_credential)
                .delete(credential_handlers::delete_credential),
        )
        .route("/info", get(handlers::get_info))
        .route("/health", get(handlers::get_health))
        .with_state(state)
}

/// Run a store or collaborator call under `limit`, flattening failure into
/// a loggable message.
pub(crate) async fn bounded<T, E, F>(limit: Duration, call: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {limit:?}")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Collaborator doubles shared by the handler tests.

    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::response::Response;
    use http_body_util::BodyExt;

    use autoscaler_core::ScalingPolicy;
    use autoscaler_state::{
        PolicyRecord, ServiceInstance, StateError, StateResult, StateStore, StoredCredentials,
    };
    use autoscaler_upstream::{ScheduleError, UpstreamError};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ScheduleCall {
        Upsert { app_id: String, guid: String },
        Delete { app_id: String },
    }

    /// Records every call; fails the configured operations.
    #[derive(Default)]
    pub struct RecordingScheduler {
        pub calls: Mutex<Vec<ScheduleCall>>,
        pub fail_upsert: bool,
        pub fail_delete: bool,
    }

    impl RecordingScheduler {
        pub fn failing(fail_upsert: bool, fail_delete: bool) -> Self {
            Self {
                fail_upsert,
                fail_delete,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<ScheduleCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn scheduler_down() -> ScheduleError {
        ScheduleError::Upstream(UpstreamError::Transport("connection refused".into()))
    }

    #[async_trait]
    impl ScheduleClient for RecordingScheduler {
        async fn create_or_update_schedule(
            &self,
            app_id: &str,
            _policy: &ScalingPolicy,
            guid: &str,
        ) -> Result<(), ScheduleError> {
            self.calls.lock().unwrap().push(ScheduleCall::Upsert {
                app_id: app_id.into(),
                guid: guid.into(),
            });
            if self.fail_upsert {
                return Err(scheduler_down());
            }
            Ok(())
        }

        async fn delete_schedule(&self, app_id: &str) -> Result<(), ScheduleError> {
            self.calls.lock().unwrap().push(ScheduleCall::Delete {
                app_id: app_id.into(),
            });
            if self.fail_delete {
                return Err(scheduler_down());
            }
            Ok(())
        }
    }

    /// A store whose every operation fails.
    pub struct BrokenStore;

    #[async_trait]
    impl PolicyStore for BrokenStore {
        async fn get_app_policy(&self, _app_id: &str) -> StateResult<Option<PolicyRecord>> {
            Err(StateError::Read("database is down".into()))
        }

        async fn save_app_policy(
            &self,
            _app_id: &str,
            _policy: &ScalingPolicy,
            _guid: &str,
        ) -> StateResult<()> {
            Err(StateError::Write("database is down".into()))
        }

        async fn delete_policy(&self, _app_id: &str) -> StateResult<()> {
            Err(StateError::Write("database is down".into()))
        }
    }

    #[async_trait]
    impl BindingStore for BrokenStore {
        async fn get_service_instance_by_app_id(
            &self,
            _app_id: &str,
        ) -> StateResult<Option<ServiceInstance>> {
            Err(StateError::Read("database is down".into()))
        }
    }

    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.db.path = "unused.redb".into();
        config.scheduler.scheduler_url = "http://127.0.0.1:1".into();
        config.scaling_engine.scaling_engine_url = "http://127.0.0.1:1".into();
        config.event_generator.event_generator_url = "http://127.0.0.1:1".into();
        config.metrics_forwarder.metrics_forwarder_url = "https://metrics.example.com".into();
        config.http_client.timeout = "2s".into();
        config
    }

    /// State over an in-memory store, with bindings enabled.
    pub fn test_state(
        config: Config,
        scheduler: Arc<RecordingScheduler>,
    ) -> (ApiState, StateStore) {
        let store = StateStore::open_in_memory().unwrap();
        let state = ApiState::new(
            Arc::new(config),
            Arc::new(store.clone()),
            scheduler,
            Arc::new(StoredCredentials::new(store.clone())),
        )
        .with_bindings(Arc::new(store.clone()));
        (state, store)
    }

    pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }
}
