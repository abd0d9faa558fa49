//! Bounded HTTP client for internal services.
//!
//! Every request is wrapped in a single timeout covering connect, headers
//! and body. Dropping the returned future (e.g. when the inbound request is
//! cancelled) abandons the in-flight call.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::error::UpstreamError;

/// Escape one caller-supplied value for use as a single URL path segment.
///
/// Dots are escaped too, so `.` and `..` cannot act as dot-segments.
pub fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).replace('.', "%2E")
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
        self.send(Method::GET, url, None).await
    }

    /// Send a request with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        json_body: Option<Vec<u8>>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            UpstreamError::InvalidUri {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(USER_AGENT, "autoscaler-api/0.1");
        if json_body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(json_body.unwrap_or_default())))
            .map_err(|e| UpstreamError::InvalidUri {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;
            let status = resp.status();
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| UpstreamError::Body(e.to_string()))?
                .to_bytes();
            Ok::<_, UpstreamError>(UpstreamResponse {
                status,
                content_type,
                body,
            })
        };

        let result = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?;
        match &result {
            Ok(resp) => debug!(%method, %url, status = %resp.status, "upstream call completed"),
            Err(e) => debug!(%method, %url, error = %e, "upstream call failed"),
        }
        result
    }
}
