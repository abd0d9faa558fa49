//! Store capabilities consumed by the public API handlers.
//!
//! Handlers hold these as trait objects so tests (and alternative backends)
//! can substitute their own implementations. `StateStore` implements both.

use async_trait::async_trait;

use autoscaler_core::ScalingPolicy;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{PolicyRecord, ServiceInstance};

/// Persistence for the single active policy of each application.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns `None` when the app has no policy; that is not an error.
    async fn get_app_policy(&self, app_id: &str) -> StateResult<Option<PolicyRecord>>;

    /// Insert or replace the app's policy under the given version token.
    async fn save_app_policy(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> StateResult<()>;

    /// Remove the app's policy. Removing an absent policy succeeds.
    async fn delete_policy(&self, app_id: &str) -> StateResult<()>;
}

/// Read access to the broker's app-to-service-instance bindings.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn get_service_instance_by_app_id(
        &self,
        app_id: &str,
    ) -> StateResult<Option<ServiceInstance>>;
}

#[async_trait]
impl PolicyStore for StateStore {
    async fn get_app_policy(&self, app_id: &str) -> StateResult<Option<PolicyRecord>> {
        let app_id = app_id.to_string();
        self.blocking(move |store| store.get_policy(&app_id)).await
    }

    async fn save_app_policy(
        &self,
        app_id: &str,
        policy: &ScalingPolicy,
        guid: &str,
    ) -> StateResult<()> {
        let (app_id, policy, guid) = (app_id.to_string(), policy.clone(), guid.to_string());
        self.blocking(move |store| store.put_policy(&app_id, &policy, &guid))
            .await
    }

    async fn delete_policy(&self, app_id: &str) -> StateResult<()> {
        let app_id = app_id.to_string();
        self.blocking(move |store| store.remove_policy(&app_id).map(|_| ()))
            .await
    }
}

#[async_trait]
impl BindingStore for StateStore {
    async fn get_service_instance_by_app_id(
        &self,
        app_id: &str,
    ) -> StateResult<Option<ServiceInstance>> {
        let app_id = app_id.to_string();
        self.blocking(move |store| store.service_instance_for_app(&app_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn policy() -> ScalingPolicy {
        serde_json::from_str(r#"{"instance_min_count":1,"instance_max_count":4}"#).unwrap()
    }

    #[tokio::test]
    async fn policy_store_through_trait_object() {
        let store: Arc<dyn PolicyStore> = Arc::new(StateStore::open_in_memory().unwrap());

        assert!(store.get_app_policy("app-123").await.unwrap().is_none());
        store.save_app_policy("app-123", &policy(), "g-1").await.unwrap();
        assert_eq!(
            store.get_app_policy("app-123").await.unwrap().unwrap().guid,
            "g-1"
        );

        store.delete_policy("app-123").await.unwrap();
        // Idempotent.
        store.delete_policy("app-123").await.unwrap();
        assert!(store.get_app_policy("app-123").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn store_calls_leave_the_runtime_thread() {
        let store = StateStore::open_in_memory().unwrap();
        let runtime_thread = std::thread::current().id();
        let ran_on = store
            .blocking(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(ran_on, runtime_thread);

        let store: Arc<dyn PolicyStore> = Arc::new(store);
        store.save_app_policy("app-123", &policy(), "g-1").await.unwrap();
        assert!(store.get_app_policy("app-123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn binding_store_through_trait_object() {
        let state = StateStore::open_in_memory().unwrap();
        state
            .put_service_instance(&ServiceInstance {
                instance_id: "si-1".into(),
                default_policy: None,
                default_policy_guid: None,
            })
            .unwrap();
        state.bind_app("app-123", "si-1").unwrap();

        let bindings: Arc<dyn BindingStore> = Arc::new(state);
        let instance = bindings
            .get_service_instance_by_app_id("app-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(instance.instance_id, "si-1");
        assert!(
            bindings
                .get_service_instance_by_app_id("other")
                .await
                .unwrap()
                .is_none()
        );
    }
}
