//! Info and health endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tracing::error;

use crate::ApiState;
use crate::error::{ApiError, ApiResult};

/// GET /info
///
/// The configured info document, served as-is.
pub async fn get_info(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let path = &state.config.info_file_path;
    let info = tokio::fs::read(path).await.map_err(|e| {
        error!(info_file_path = %path, error = %e, "failed to read info file");
        ApiError::internal("Failed to load info")
    })?;
    Ok(([(CONTENT_TYPE, "application/json")], info))
}

/// GET /health
pub async fn get_health() -> impl IntoResponse {
    Json(serde_json::json!({ "alive": "true" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;
    use crate::testing::*;

    #[tokio::test]
    async fn info_serves_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        std::fs::write(&path, r#"{"name":"Autoscaler","build":"1.0"}"#).unwrap();

        let mut config = test_config();
        config.info_file_path = path.to_string_lossy().into_owned();
        let (state, _) = test_state(config, Arc::new(RecordingScheduler::default()));

        let resp = get_info(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(resp).await["name"], "Autoscaler");
    }

    #[tokio::test]
    async fn missing_info_file_is_internal() {
        let mut config = test_config();
        config.info_file_path = "/nonexistent/info.json".into();
        let (state, _) = test_state(config, Arc::new(RecordingScheduler::default()));

        let resp = get_info(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["message"], "Failed to load info");
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let resp = get_health().await.into_response();
        assert_eq!(body_json(resp).await, serde_json::json!({"alive": "true"}));
    }
}
