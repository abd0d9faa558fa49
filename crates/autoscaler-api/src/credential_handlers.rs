//! Metrics-ingestion credentials.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::Serialize;
use tracing::{error, info, instrument};

use autoscaler_state::Credential;

use crate::error::{ApiError, ApiResult};
use crate::policy_handlers::require_app_id;
use crate::{ApiState, bounded};

/// Returned once on create; the password is not retrievable afterwards.
#[derive(Debug, Serialize)]
pub struct IssuedCredential {
    pub app_id: String,
    #[serde(flatten)]
    pub credential: Credential,
    /// Where the app should send custom metrics.
    pub url: String,
}

/// POST /credentials/{app_id}
///
/// An empty body asks for generated credentials.
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn create_credential(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<IssuedCredential>> {
    require_app_id(&app_id)?;

    let supplied = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let credential: Credential = serde_json::from_slice(&body).map_err(|e| {
            info!(error = %e, "malformed credential body");
            ApiError::bad_request("Invalid credential format")
        })?;
        if !credential.is_complete() {
            info!("username or password missing");
            return Err(ApiError::bad_request(
                "Username and password are both required",
            ));
        }
        Some(credential)
    };

    let credential = bounded(
        state.call_timeout,
        state.credentials.create(&app_id, supplied),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "failed to create credential");
        ApiError::internal("Error creating credential")
    })?;

    info!("credential created");
    Ok(Json(IssuedCredential {
        app_id,
        credential,
        url: state.config.metrics_forwarder.metrics_forwarder_url.clone(),
    }))
}

/// DELETE /credentials/{app_id}
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn delete_credential(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
) -> ApiResult<()> {
    require_app_id(&app_id)?;

    bounded(state.call_timeout, state.credentials.delete(&app_id))
        .await
        .map_err(|e| {
            error!(error = %e, "failed to delete credential");
            ApiError::internal("Error deleting credential")
        })?;
    info!("credential deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    use autoscaler_state::{CredentialError, CredentialManager, StateError, StateStore};

    use super::*;
    use crate::testing::*;

    /// Counts calls; optionally fails them.
    #[derive(Default)]
    struct CountingCredentials {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CredentialManager for CountingCredentials {
        async fn create(
            &self,
            _app_id: &str,
            supplied: Option<Credential>,
        ) -> Result<Credential, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StateError::Write("disk full".into()).into());
            }
            Ok(supplied.unwrap_or(Credential {
                username: "generated-user".into(),
                password: "generated-pass".into(),
            }))
        }

        async fn delete(&self, _app_id: &str) -> Result<(), CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StateError::Write("disk full".into()).into());
            }
            Ok(())
        }

        async fn validate(&self, _app_id: &str, _c: &Credential) -> Result<bool, CredentialError> {
            Ok(false)
        }
    }

    fn state_with(creds: Arc<CountingCredentials>) -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        ApiState::new(
            Arc::new(test_config()),
            Arc::new(store),
            Arc::new(RecordingScheduler::default()),
            creds,
        )
    }

    async fn create(state: &ApiState, body: &str) -> Response {
        create_credential(
            State(state.clone()),
            Path("app-123".into()),
            Bytes::from(body.to_string()),
        )
        .await
        .into_response()
    }

    #[tokio::test]
    async fn empty_body_generates_credentials() {
        let creds = Arc::new(CountingCredentials::default());
        let resp = create(&state_with(creds.clone()), "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({
                "app_id": "app-123",
                "username": "generated-user",
                "password": "generated-pass",
                "url": "https://metrics.example.com"
            })
        );
        assert_eq!(creds.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn supplied_credentials_are_passed_through() {
        let creds = Arc::new(CountingCredentials::default());
        let resp = create(
            &state_with(creds),
            r#"{"username":"user","password":"secret"}"#,
        )
        .await;
        let body = body_json(resp).await;
        assert_eq!(body["username"], "user");
        assert_eq!(body["password"], "secret");
    }

    #[tokio::test]
    async fn incomplete_body_fails_before_collaborator() {
        let creds = Arc::new(CountingCredentials::default());
        let state = state_with(creds.clone());
        for body in [
            r#"{"username":"user"}"#,
            r#"{"password":"secret"}"#,
            r#"{"username":"","password":"secret"}"#,
            "{}",
        ] {
            let resp = create(&state, body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(
                body_json(resp).await["message"],
                "Username and password are both required"
            );
        }
        assert_eq!(creds.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let creds = Arc::new(CountingCredentials::default());
        let resp = create(&state_with(creds.clone()), "username=user").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "Invalid credential format");
        assert_eq!(creds.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn collaborator_failure_is_internal() {
        let creds = Arc::new(CountingCredentials {
            fail: true,
            ..Default::default()
        });
        let state = state_with(creds);

        let resp = create(&state, "").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["message"], "Error creating credential");

        let resp = delete_credential(State(state), Path("app-123".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["message"], "Error deleting credential");
    }

    #[tokio::test]
    async fn delete_returns_empty_body() {
        let creds = Arc::new(CountingCredentials::default());
        let resp = delete_credential(State(state_with(creds)), Path("app-123".into()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_bytes(resp).await.is_empty());
    }
}
