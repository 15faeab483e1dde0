// End-to-end tests for the governed HTTP surface
//
// The router is driven in-process with tower's `oneshot`; time comes from a
// manual clock so window arithmetic is exact.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use pagelens_gateway::analyzer::{AnalysisReport, AnalysisRequest, Analyzer};
use pagelens_gateway::cache::{CacheConfig, ResultCache};
use pagelens_gateway::clock::{Clock, ManualClock};
use pagelens_gateway::http::{router, AppState};
use pagelens_gateway::rate_limit::{AdmissionController, RateLimitConfig};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Debug, Default)]
struct CountingAnalyzer {
    calls: AtomicUsize,
}

#[async_trait]
impl Analyzer for CountingAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let labels: BTreeSet<String> = ["nginx".to_string()].into_iter().collect();
        AnalysisReport::new(request, labels)
    }
}

struct Harness {
    app: Router,
    clock: Arc<ManualClock>,
    analyzer: Arc<CountingAnalyzer>,
}

fn harness(default_limit: u32, overrides: &[(&str, u32)]) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let shared_clock: Arc<dyn Clock> = clock.clone();

    let rate_limit = RateLimitConfig {
        default_limit,
        window_secs: 60,
        cleanup_interval_secs: 0,
        tenant_overrides: overrides
            .iter()
            .map(|(tenant, limit)| (tenant.to_string(), *limit))
            .collect::<HashMap<_, _>>(),
        ..RateLimitConfig::default()
    };
    let cache_config = CacheConfig {
        max_size: 16,
        ttl_ms: 1_000,
        ..CacheConfig::default()
    };

    let controller =
        AdmissionController::with_clock(&rate_limit, Arc::clone(&shared_clock)).unwrap();
    let cache = ResultCache::with_clock(&cache_config, shared_clock).unwrap();
    let analyzer = Arc::new(CountingAnalyzer::default());

    let state = AppState {
        controller: Arc::new(controller),
        cache: Arc::new(cache),
        analyzer: analyzer.clone(),
        rate_limit: Arc::new(rate_limit),
        cache_config: Arc::new(cache_config),
        metrics_enabled: true,
    };

    Harness {
        app: router(state),
        clock,
        analyzer,
    }
}

fn analyze_request(tenant: Option<&str>, url: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/analyze")
        .header("content-type", "application/json");
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    builder
        .body(Body::from(format!(r#"{{"url":"{}"}}"#, url)))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

#[tokio::test]
async fn test_admitted_requests_carry_quota_headers() {
    let h = harness(3, &[]);

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-limit"), "3");
    assert_eq!(header(&response, "x-ratelimit-remaining"), "2");

    let reset = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
    assert_eq!(
        header(&response, "x-ratelimit-reset"),
        reset.timestamp().to_string()
    );
}

#[tokio::test]
async fn test_exhausted_tenant_gets_429() {
    let h = harness(100, &[("tenant-a", 2)]);

    for _ in 0..2 {
        let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "retry-after"), "60");
    assert_eq!(header(&response, "x-ratelimit-limit"), "2");
    assert_eq!(header(&response, "x-ratelimit-remaining"), "0");

    let body = json_body(response).await;
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["retry_after_secs"], 60);
}

#[tokio::test]
async fn test_quota_returns_after_window() {
    let h = harness(1, &[]);

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    h.clock.advance(Duration::from_secs(60));

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining"), "0");
}

#[tokio::test]
async fn test_tenants_do_not_share_quota() {
    let h = harness(1, &[]);

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = send(&h.app, analyze_request(Some("tenant-b"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_requests_without_tenant_bypass_admission() {
    let h = harness(1, &[]);

    for _ in 0..3 {
        let response = send(&h.app, analyze_request(None, "https://a.example")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let h = harness(10, &[]);

    let first = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(header(&first, "x-cache"), "MISS");
    let first = json_body(first).await;

    let second = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(header(&second, "x-cache"), "HIT");
    let second = json_body(second).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(h.analyzer.calls.load(Ordering::SeqCst), 1);

    // A different body is a different fingerprint.
    let other = send(&h.app, analyze_request(Some("tenant-a"), "https://b.example")).await;
    assert_eq!(header(&other, "x-cache"), "MISS");
    assert_eq!(h.analyzer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cached_result_expires() {
    let h = harness(10, &[]);

    send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    h.clock.advance(Duration::from_millis(1_500));

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(header(&response, "x-cache"), "MISS");
    assert_eq!(h.analyzer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_hits_still_consume_quota() {
    let h = harness(2, &[]);

    send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;

    let response = send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_invalid_body_rejected() {
    let h = harness(10, &[]);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/analyze")
        .header("x-tenant-id", "tenant-a")
        .body(Body::from("not json"))
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_governance_stats_and_cache_clear() {
    let h = harness(5, &[]);

    send(&h.app, analyze_request(Some("tenant-a"), "https://a.example")).await;

    let stats = Request::builder()
        .uri("/v1/admin/governance")
        .body(Body::empty())
        .unwrap();
    let body = json_body(send(&h.app, stats).await).await;
    assert_eq!(body["rate_limit"]["tracked_tenants"], 1);
    assert_eq!(body["rate_limit"]["tenants"][0]["tenant"], "tenant-a");
    assert_eq!(body["cache"]["size"], 1);

    let clear = Request::builder()
        .method("POST")
        .uri("/v1/admin/cache/clear")
        .body(Body::empty())
        .unwrap();
    let body = json_body(send(&h.app, clear).await).await;
    assert_eq!(body["cleared"], 1);
}

#[tokio::test]
async fn test_health_and_metrics_are_ungoverned() {
    let h = harness(1, &[]);
    pagelens_gateway::metrics::init();

    for _ in 0..3 {
        let request = Request::builder()
            .uri("/health")
            .header("x-tenant-id", "tenant-a")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&h.app, request).await.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}
