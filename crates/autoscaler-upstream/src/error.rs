//! Upstream error types.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Failures to complete an HTTP exchange with an internal service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url {url}: {reason}")]
    InvalidUri { url: String, reason: String },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read upstream response body: {0}")]
    Body(String),
}

/// Errors from the scheduler collaborator.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to reach scheduler: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Error occurred in scheduler module during {action}: {status} {body}")]
    Rejected {
        action: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("failed to encode policy for scheduler: {0}")]
    Encode(#[from] serde_json::Error),
}
