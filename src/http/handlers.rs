// Route handlers for the gateway
//
// /v1/analyze runs behind the result cache; the admin routes expose the
// governance state; /metrics and /health serve the scrapers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::error::ApiError;
use super::server::AppState;
use crate::analyzer::{AnalysisReport, AnalysisRequest};
use crate::cache::{CacheConfig, CacheStats};
use crate::metrics;
use crate::rate_limit::ControllerStats;

static CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache");

/// Combined governance snapshot served at /v1/admin/governance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceStats {
    pub rate_limit: ControllerStats,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

/// Analyze a page, serving repeats from the result cache.
pub async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: AnalysisRequest = serde_json::from_slice(&body)?;
    if request.url.trim().is_empty() {
        return Err(ApiError::invalid_input("url must not be empty"));
    }

    let key = state
        .cache_config
        .enabled
        .then(|| state.cache.key_for(keyed_headers(&headers, &state.cache_config), &body));

    if let Some(key) = &key {
        if let Some(report) = state.cache.get_by_key(key) {
            debug!(key = %key, url = %report.url, "Serving cached analysis");
            return Ok(report_response(&report, "HIT"));
        }
    }

    let report = Arc::new(state.analyzer.analyze(&request).await);
    if let Some(key) = key {
        state.cache.set_by_key(key, Arc::clone(&report));
    }

    Ok(report_response(&report, "MISS"))
}

/// Snapshot admission windows and cache occupancy.
pub async fn governance_stats_handler(State(state): State<AppState>) -> Json<GovernanceStats> {
    Json(GovernanceStats {
        rate_limit: state.controller.stats(),
        cache: state.cache.stats(),
    })
}

/// Drop every cached result.
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<CacheCleared> {
    let cleared = state.cache.clear();
    info!(cleared, "Result cache cleared");
    Json(CacheCleared { cleared })
}

/// Metrics endpoint handler
pub async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            ApiError::internal(format!("Error gathering metrics: {}", e)).into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Request headers that take part in the cache key.
fn keyed_headers<'a>(
    headers: &'a HeaderMap,
    config: &'a CacheConfig,
) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
    headers
        .iter()
        .filter(|(name, _)| config.is_keyed_header(name.as_str()))
        .map(|(name, value)| (name.as_str(), value.as_bytes()))
}

fn report_response(report: &AnalysisReport, cache_status: &'static str) -> Response {
    let mut response = Json(report).into_response();
    response
        .headers_mut()
        .insert(CACHE_STATUS.clone(), HeaderValue::from_static(cache_status));
    response
}
