//! Tenant resolution and admission middleware
//!
//! `tenant_middleware` stands in for the authentication layer: it turns the
//! `x-tenant-id` header into a [`TenantContext`]. `admission_middleware`
//! charges the tenant's quota and surfaces the decision as headers, or as a
//! 429 once the quota is spent. Requests without a tenant bypass admission.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::error::ApiError;
use super::server::AppState;
use crate::rate_limit::Decision;

pub const TENANT_HEADER: &str = "x-tenant-id";

static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Authenticated tenant attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,

    /// Tenant quota override, 0 for the default
    pub rate_limit: u32,
}

/// Resolve the tenant from the `x-tenant-id` header.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let tenant_id = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned);

    if let Some(tenant_id) = tenant_id {
        let rate_limit = state.rate_limit.limit_for(&tenant_id);
        request.extensions_mut().insert(TenantContext {
            tenant_id,
            rate_limit,
        });
    }

    next.run(request).await
}

/// Charge the tenant's quota before the handler runs.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.rate_limit.enabled {
        return next.run(request).await;
    }

    let Some(tenant) = request.extensions().get::<TenantContext>().cloned() else {
        debug!("No tenant on request, skipping admission control");
        return next.run(request).await;
    };

    let decision = state
        .controller
        .check_and_consume(&tenant.tenant_id, tenant.rate_limit);

    if !decision.allowed {
        let retry_after = decision
            .retry_after_secs(state.controller.now())
            .max(1);
        let mut response = ApiError::rate_limited(retry_after).into_response();
        let headers = response.headers_mut();
        apply_rate_limit_headers(headers, &decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Write limit, remaining quota and reset instant (unix seconds).
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET.clone(),
        HeaderValue::from(decision.reset_epoch_secs()),
    );
}
