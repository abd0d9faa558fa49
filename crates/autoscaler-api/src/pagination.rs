//! Re-pagination of history payloads.
//!
//! Internal services answer on their own address. Before a page leaves the
//! API its navigation links are rebuilt on the public base URL and request
//! path, carrying the caller's query parameters with only `page` changed.

use axum::http::HeaderMap;
use axum::http::header::HOST;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history_handlers::HistoryParams;

/// The page shape returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedEnvelope {
    pub total_results: u64,
    pub total_pages: u64,
    pub page: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(default)]
    pub resources: Vec<Value>,
}

/// Internal services either page for us or return the whole list.
#[derive(Deserialize)]
#[serde(untagged)]
enum UpstreamPayload {
    Items(Vec<Value>),
    Envelope(PaginatedEnvelope),
}

/// Where callers reach the API: scheme + host, and the request path.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicLocation {
    base: String,
    path: String,
}

impl PublicLocation {
    pub fn new(base: &str, path: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            path: path.to_string(),
        }
    }

    /// Prefer the configured external URL; otherwise trust the forwarding
    /// proxy's headers.
    pub fn resolve(external_url: Option<&str>, headers: &HeaderMap, path: &str) -> Self {
        if let Some(url) = external_url.filter(|u| !u.is_empty()) {
            return Self::new(url, path);
        }
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("http");
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        Self::new(&format!("{scheme}://{host}"), path)
    }

    fn link(&self, params: &HistoryParams, page: u64) -> String {
        format!("{}{}?{}", self.base, self.path, params.encode_with_page(page))
    }
}

/// Parse an upstream 200 body and return it as a public page.
pub fn repaginate(
    body: &[u8],
    params: &HistoryParams,
    location: &PublicLocation,
) -> Result<PaginatedEnvelope, serde_json::Error> {
    let payload: UpstreamPayload = serde_json::from_slice(body)?;
    let page = match payload {
        UpstreamPayload::Envelope(envelope) => relink(envelope, params, location),
        UpstreamPayload::Items(items) => paginate_items(items, params, location),
    };
    Ok(page)
}

/// Keep the upstream's paging; only the links move to the public address.
fn relink(
    mut envelope: PaginatedEnvelope,
    params: &HistoryParams,
    location: &PublicLocation,
) -> PaginatedEnvelope {
    let page = envelope.page;
    envelope.prev_url = envelope
        .prev_url
        .take()
        .map(|_| location.link(params, page.saturating_sub(1).max(1)));
    envelope.next_url = envelope
        .next_url
        .take()
        .map(|_| location.link(params, page.saturating_add(1)));
    envelope
}

fn paginate_items(
    items: Vec<Value>,
    params: &HistoryParams,
    location: &PublicLocation,
) -> PaginatedEnvelope {
    let per_page = u64::from(params.results_per_page());
    let page = u64::from(params.page());
    let total_results = items.len() as u64;
    let total_pages = total_results.div_ceil(per_page);

    let start = (page - 1).saturating_mul(per_page);
    let resources: Vec<Value> = items
        .into_iter()
        .skip(usize::try_from(start).unwrap_or(usize::MAX))
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .collect();

    let prev_url =
        (page > 1 && page <= total_pages + 1).then(|| location.link(params, page - 1));
    let next_url = (page < total_pages).then(|| location.link(params, page + 1));

    PaginatedEnvelope {
        total_results,
        total_pages,
        page,
        prev_url,
        next_url,
        resources,
    }
}
