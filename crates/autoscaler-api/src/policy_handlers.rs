//! Policy attach, detach and read.
//!
//! The policy store and the scheduler are written in sequence with no
//! rollback. Attach reports a scheduler failure after the policy is stored;
//! detach restores a bound service instance's default policy and only warns
//! when that default's schedule cannot be synced.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use autoscaler_core::{PolicyValidator, ScalingPolicy};

use crate::error::{ApiError, ApiResult};
use crate::{ApiState, bounded};

/// Carries a non-fatal problem from a detach that otherwise succeeded.
pub const WARNING_HEADER: HeaderName = HeaderName::from_static("x-autoscaler-warning");

/// A policy as returned to callers: the document plus its version token.
#[derive(Debug, Serialize)]
pub struct PolicyView {
    #[serde(flatten)]
    pub policy: ScalingPolicy,
    pub guid: String,
}

pub(crate) fn require_app_id(app_id: &str) -> ApiResult<()> {
    if app_id.trim().is_empty() {
        info!("request without app id");
        return Err(ApiError::bad_request("AppId is required"));
    }
    Ok(())
}

/// GET /policies/{app_id}
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn get_policy(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
) -> ApiResult<Json<PolicyView>> {
    require_app_id(&app_id)?;

    let record = bounded(state.call_timeout, state.policies.get_app_policy(&app_id))
        .await
        .map_err(|e| {
            error!(error = %e, "failed to retrieve policy");
            ApiError::internal("Error retrieving scaling policy")
        })?
        .ok_or_else(|| ApiError::not_found("Policy Not Found"))?;

    Ok(Json(PolicyView {
        policy: record.policy,
        guid: record.guid,
    }))
}

/// PUT /policies/{app_id}
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn attach_policy(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    body: Bytes,
) -> Result<Json<PolicyView>, Response> {
    require_app_id(&app_id).map_err(IntoResponse::into_response)?;

    let policy = state.validator.validate(&body).map_err(|errors| {
        info!(errors = errors.len(), "policy rejected");
        (StatusCode::BAD_REQUEST, Json(errors)).into_response()
    })?;

    let guid = Uuid::new_v4().to_string();
    bounded(
        state.call_timeout,
        state.policies.save_app_policy(&app_id, &policy, &guid),
    )
    .await
    .map_err(|e| {
        error!(policy_guid = %guid, error = %e, "failed to save policy");
        ApiError::internal("Error saving policy").into_response()
    })?;

    // The stored policy stays even if the scheduler refuses it.
    bounded(
        state.call_timeout,
        state
            .schedules
            .create_or_update_schedule(&app_id, &policy, &guid),
    )
    .await
    .map_err(|e| {
        error!(policy_guid = %guid, error = %e, "failed to sync schedules");
        ApiError::internal(e).into_response()
    })?;

    info!(policy_guid = %guid, "policy attached");
    Ok(Json(PolicyView { policy, guid }))
}

/// DELETE /policies/{app_id}
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn detach_policy(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
) -> ApiResult<Response> {
    require_app_id(&app_id)?;

    bounded(state.call_timeout, state.policies.delete_policy(&app_id))
        .await
        .map_err(|e| {
            error!(error = %e, "failed to delete policy");
            ApiError::internal("Error deleting policy")
        })?;

    let schedule_deleted = bounded(state.call_timeout, state.schedules.delete_schedule(&app_id))
        .await
        .inspect_err(|e| error!(error = %e, "failed to delete schedules"))
        .is_ok();

    let warning = restore_default_policy(&state, &app_id).await?;

    if !schedule_deleted {
        return Err(ApiError::internal("Error deleting schedules"));
    }

    info!(fallback_warning = warning.is_some(), "policy detached");
    let mut resp = Json(serde_json::json!({})).into_response();
    if let Some(header) = warning.as_deref().map(header_value) {
        resp.headers_mut().insert(WARNING_HEADER, header);
    }
    Ok(resp)
}

/// Reattach the default policy of the app's service instance, if any.
///
/// Returns a warning when the default was stored but its schedules could
/// not be synced.
async fn restore_default_policy(state: &ApiState, app_id: &str) -> ApiResult<Option<String>> {
    let Some(bindings) = &state.bindings else {
        return Ok(None);
    };

    let instance = bounded(
        state.call_timeout,
        bindings.get_service_instance_by_app_id(app_id),
    )
    .await
    .map_err(|e| {
        error!(error = %e, "failed to retrieve service instance");
        ApiError::internal("Error retrieving service instance")
    })?;
    let Some(instance) = instance else {
        return Ok(None);
    };
    let Some(document) = instance.default_policy() else {
        return Ok(None);
    };

    let policy = PolicyValidator::parse_unchecked(document).map_err(|e| {
        error!(instance_id = %instance.instance_id, error = %e, "stored default policy is invalid");
        ApiError::internal("Default policy not valid")
    })?;
    let guid = instance
        .default_policy_guid
        .clone()
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    bounded(
        state.call_timeout,
        state.policies.save_app_policy(app_id, &policy, &guid),
    )
    .await
    .map_err(|e| {
        error!(policy_guid = %guid, error = %e, "failed to attach default policy");
        ApiError::internal("Error attaching the default policy")
    })?;
    info!(policy_guid = %guid, instance_id = %instance.instance_id, "default policy attached");

    match bounded(
        state.call_timeout,
        state
            .schedules
            .create_or_update_schedule(app_id, &policy, &guid),
    )
    .await
    {
        Ok(()) => Ok(None),
        Err(e) => {
            warn!(policy_guid = %guid, error = %e, "default policy schedules not synced");
            Ok(Some(format!("Failed to update schedule: {e}")))
        }
    }
}

/// Header values must be visible ASCII.
fn header_value(message: &str) -> HeaderValue {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { ' ' })
        .collect();
    HeaderValue::from_str(&cleaned).unwrap_or(HeaderValue::from_static("schedule sync failed"))
}
