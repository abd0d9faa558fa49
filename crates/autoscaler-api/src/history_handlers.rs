//! Scaling and metric history proxy.
//!
//! Queries are validated and normalized here, forwarded as a single GET to
//! the owning internal service, and the answer is re-paginated for the
//! caller. Upstream error statuses pass through untouched.

use axum::Json;
use axum::extract::{OriginalUri, Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, instrument, warn};

use autoscaler_upstream::path_segment;

use crate::ApiState;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PublicLocation, repaginate};
use crate::policy_handlers::require_app_id;

const START_TIME: &str = "start-time";
const END_TIME: &str = "end-time";
const ORDER_DIRECTION: &str = "order-direction";
const LEGACY_ORDER: &str = "order";
const PAGE: &str = "page";
const RESULTS_PER_PAGE: &str = "results-per-page";

/// Normalized history query.
///
/// Recognized parameters come first with defaults filled in; anything else
/// the caller sent follows in its original order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryParams {
    pairs: Vec<(String, String)>,
    page: u32,
    results_per_page: u32,
}

impl HistoryParams {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        let given: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or(""))
            .map_err(|e| format!("invalid query string: {e}"))?;
        let first = |name: &str| {
            given
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let start_time = integer(first(START_TIME), START_TIME, 0)?;
        let end_time = integer(first(END_TIME), END_TIME, -1)?;
        let order = match first(ORDER_DIRECTION).or(first(LEGACY_ORDER)) {
            None => "desc".to_string(),
            Some(v) if v.eq_ignore_ascii_case("asc") || v.eq_ignore_ascii_case("desc") => {
                v.to_ascii_lowercase()
            }
            Some(_) => return Err("order-direction must be asc or desc".into()),
        };
        let page = positive(first(PAGE), PAGE, 1)?;
        let results_per_page = positive(first(RESULTS_PER_PAGE), RESULTS_PER_PAGE, 50)?;

        let known = [
            START_TIME,
            END_TIME,
            ORDER_DIRECTION,
            LEGACY_ORDER,
            PAGE,
            RESULTS_PER_PAGE,
        ];
        let mut pairs = vec![
            (START_TIME.to_string(), start_time.to_string()),
            (END_TIME.to_string(), end_time.to_string()),
            (ORDER_DIRECTION.to_string(), order),
            (PAGE.to_string(), page.to_string()),
            (RESULTS_PER_PAGE.to_string(), results_per_page.to_string()),
        ];
        pairs.extend(
            given
                .iter()
                .filter(|(k, _)| !known.contains(&k.as_str()))
                .cloned(),
        );

        Ok(Self {
            pairs,
            page,
            results_per_page,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn results_per_page(&self) -> u32 {
        self.results_per_page
    }

    pub fn encode(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }

    /// The same query pointing at another page.
    pub fn encode_with_page(&self, page: u64) -> String {
        let pairs: Vec<(&str, String)> = self
            .pairs
            .iter()
            .map(|(k, v)| {
                let v = if k == PAGE { page.to_string() } else { v.clone() };
                (k.as_str(), v)
            })
            .collect();
        serde_urlencoded::to_string(&pairs).unwrap_or_default()
    }
}

fn integer(value: Option<&str>, name: &str, default: i64) -> Result<i64, String> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| format!("{name} must be an integer")),
    }
}

fn positive(value: Option<&str>, name: &str, default: u32) -> Result<u32, String> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(format!("{name} must be an integer greater than zero")),
        },
    }
}

/// GET /scaling_histories/{app_id}
#[instrument(skip_all, fields(app_id = %app_id))]
pub async fn get_scaling_histories(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    RawQuery(query): RawQuery,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_app_id(&app_id)?;
    let params = parse_params(query.as_deref())?;

    let url = format!(
        "{}/v1/apps/{}/scaling_histories?{}",
        state
            .config
            .scaling_engine
            .scaling_engine_url
            .trim_end_matches('/'),
        path_segment(&app_id),
        params.encode()
    );
    let location = public_location(&state, &headers, uri.path());
    proxy(&state, &url, &params, &location, "scaling history from scaling engine").await
}

/// GET /metric_histories/{app_id}/{metric_type}
#[instrument(skip_all, fields(app_id = %app_id, metric_type = %metric_type))]
pub async fn get_aggregated_metric_histories(
    State(state): State<ApiState>,
    Path((app_id, metric_type)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_app_id(&app_id)?;
    let params = parse_params(query.as_deref())?;
    if metric_type.trim().is_empty() {
        info!("request without metric type");
        return Err(ApiError::bad_request("Metrictype is required"));
    }

    let url = format!(
        "{}/v1/apps/{}/aggregated_metric_histories/{}?{}",
        state
            .config
            .event_generator
            .event_generator_url
            .trim_end_matches('/'),
        path_segment(&app_id),
        path_segment(&metric_type),
        params.encode()
    );
    let location = public_location(&state, &headers, uri.path());
    proxy(&state, &url, &params, &location, "metrics history from eventgenerator").await
}

fn parse_params(query: Option<&str>) -> ApiResult<HistoryParams> {
    HistoryParams::parse(query).map_err(|e| {
        info!(error = %e, "bad history query");
        ApiError::bad_request(e)
    })
}

fn public_location(state: &ApiState, headers: &HeaderMap, path: &str) -> PublicLocation {
    PublicLocation::resolve(
        state.config.public_api_server.external_url.as_deref(),
        headers,
        path,
    )
}

async fn proxy(
    state: &ApiState,
    url: &str,
    params: &HistoryParams,
    location: &PublicLocation,
    description: &str,
) -> ApiResult<Response> {
    let resp = state.upstream.get(url).await.map_err(|e| {
        error!(%url, error = %e, "failed to retrieve {description}");
        ApiError::internal(format!("Error retrieving {description}"))
    })?;

    if resp.status != StatusCode::OK {
        warn!(%url, status = %resp.status, "upstream rejected {description}");
        let mut relayed = (resp.status, resp.body).into_response();
        match resp
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            Some(value) => relayed.headers_mut().insert(CONTENT_TYPE, value),
            None => relayed.headers_mut().remove(CONTENT_TYPE),
        };
        return Ok(relayed);
    }

    let page = repaginate(&resp.body, params, location).map_err(|e| {
        error!(%url, error = %e, "failed to parse {description}");
        ApiError::internal(format!("Error parsing {description}"))
    })?;
    Ok(Json(page).into_response())
}
